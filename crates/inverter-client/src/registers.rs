//! SolarEdge register maps.
//!
//! Point names follow the vendor convention the rest of the pipeline keys
//! on: identity points carry a `c_` prefix, scale-factor registers end in
//! `_scale`. Not-implemented points are marked by SunSpec sentinel values
//! and omitted from the reading.

use types::{DeviceKind, RawReading, RawValue};

#[derive(Debug, Clone, Copy)]
pub enum PointKind {
    U16,
    I16,
    U32,
    F32,
    /// Fixed-width string, length in 16-bit words.
    Str(u16),
}

#[derive(Debug, Clone, Copy)]
pub struct Point {
    pub name: &'static str,
    /// Register offset relative to the block base.
    pub offset: u16,
    pub kind: PointKind,
}

const fn point(name: &'static str, offset: u16, kind: PointKind) -> Point {
    Point { name, offset, kind }
}

#[derive(Debug)]
pub struct RegisterBlock {
    pub kind: DeviceKind,
    /// Absolute register address of the block start.
    pub base: u16,
    /// Registers to fetch in one read.
    pub length: u16,
    pub points: &'static [Point],
}

const U16_SENTINEL: u16 = 0xFFFF;
const I16_SENTINEL: i16 = i16::MIN;
const U32_SENTINEL: u32 = u32::MAX;

impl RegisterBlock {
    /// Turns a fetched register window into a flat reading. Truncated
    /// windows simply yield fewer points; the poll pipeline treats a
    /// reading without identity as a skipped poll.
    pub fn decode(&self, registers: &[u16]) -> RawReading {
        let mut reading = RawReading::new();

        for point in self.points {
            let offset = point.offset as usize;
            match point.kind {
                PointKind::Str(words) => {
                    let Some(slice) = registers.get(offset..offset + words as usize) else {
                        continue;
                    };
                    reading.insert(
                        point.name.to_string(),
                        RawValue::Text(decode_string(slice)),
                    );
                }
                PointKind::U16 => {
                    let Some(&value) = registers.get(offset) else { continue };
                    if value == U16_SENTINEL {
                        continue;
                    }
                    reading.insert(point.name.to_string(), RawValue::Integer(value as i64));
                }
                PointKind::I16 => {
                    let Some(&value) = registers.get(offset) else { continue };
                    let value = value as i16;
                    if value == I16_SENTINEL {
                        continue;
                    }
                    reading.insert(point.name.to_string(), RawValue::Integer(value as i64));
                }
                PointKind::U32 => {
                    let Some(value) = decode_u32(registers, offset) else { continue };
                    if value == U32_SENTINEL {
                        continue;
                    }
                    reading.insert(point.name.to_string(), RawValue::Integer(value as i64));
                }
                PointKind::F32 => {
                    let Some(bits) = decode_u32(registers, offset) else { continue };
                    let value = f32::from_bits(bits);
                    if value.is_nan() {
                        continue;
                    }
                    reading.insert(point.name.to_string(), RawValue::Float(value as f64));
                }
            }
        }

        reading
    }
}

fn decode_u32(registers: &[u16], offset: usize) -> Option<u32> {
    let hi = *registers.get(offset)?;
    let lo = *registers.get(offset + 1)?;
    Some((u32::from(hi) << 16) | u32::from(lo))
}

fn decode_string(registers: &[u16]) -> String {
    let mut bytes = Vec::with_capacity(registers.len() * 2);
    for register in registers {
        bytes.push((register >> 8) as u8);
        bytes.push((register & 0xFF) as u8);
    }
    String::from_utf8_lossy(&bytes)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

/// SunSpec common block plus the single-phase/three-phase inverter model,
/// one contiguous window starting at the well-known base.
pub static INVERTER_BLOCK: RegisterBlock = RegisterBlock {
    kind: DeviceKind::Inverter,
    base: 40_000,
    length: 110,
    points: &[
        point("c_id", 0, PointKind::Str(2)),
        point("c_did", 2, PointKind::U16),
        point("c_length", 3, PointKind::U16),
        point("c_manufacturer", 4, PointKind::Str(16)),
        point("c_model", 20, PointKind::Str(16)),
        point("c_version", 44, PointKind::Str(8)),
        point("c_serialnumber", 52, PointKind::Str(16)),
        point("c_deviceaddress", 68, PointKind::U16),
        point("c_sunspec_did", 69, PointKind::U16),
        point("c_sunspec_length", 70, PointKind::U16),
        point("current", 71, PointKind::U16),
        point("l1_current", 72, PointKind::U16),
        point("l2_current", 73, PointKind::U16),
        point("l3_current", 74, PointKind::U16),
        point("current_scale", 75, PointKind::I16),
        point("l1_voltage", 76, PointKind::U16),
        point("l2_voltage", 77, PointKind::U16),
        point("l3_voltage", 78, PointKind::U16),
        point("l1n_voltage", 79, PointKind::U16),
        point("l2n_voltage", 80, PointKind::U16),
        point("l3n_voltage", 81, PointKind::U16),
        point("voltage_scale", 82, PointKind::I16),
        point("power_ac", 83, PointKind::I16),
        point("power_ac_scale", 84, PointKind::I16),
        point("frequency", 85, PointKind::U16),
        point("frequency_scale", 86, PointKind::I16),
        point("power_apparent", 87, PointKind::I16),
        point("power_apparent_scale", 88, PointKind::I16),
        point("power_reactive", 89, PointKind::I16),
        point("power_reactive_scale", 90, PointKind::I16),
        point("power_factor", 91, PointKind::I16),
        point("power_factor_scale", 92, PointKind::I16),
        point("energy_total", 93, PointKind::U32),
        point("energy_total_scale", 95, PointKind::U16),
        point("current_dc", 96, PointKind::U16),
        point("current_dc_scale", 97, PointKind::I16),
        point("voltage_dc", 98, PointKind::U16),
        point("voltage_dc_scale", 99, PointKind::I16),
        point("power_dc", 100, PointKind::I16),
        point("power_dc_scale", 101, PointKind::I16),
        point("temperature", 103, PointKind::I16),
        point("temperature_scale", 106, PointKind::I16),
        point("status", 107, PointKind::U16),
        point("vendor_status", 108, PointKind::U16),
    ],
};

const METER_POINTS: &[Point] = &[
    point("c_did", 0, PointKind::U16),
    point("c_length", 1, PointKind::U16),
    point("c_manufacturer", 2, PointKind::Str(16)),
    point("c_model", 18, PointKind::Str(16)),
    point("c_option", 34, PointKind::Str(8)),
    point("c_version", 42, PointKind::Str(8)),
    point("c_serialnumber", 50, PointKind::Str(16)),
    point("c_deviceaddress", 66, PointKind::U16),
    point("c_sunspec_did", 67, PointKind::U16),
    point("c_sunspec_length", 68, PointKind::U16),
    point("current", 69, PointKind::I16),
    point("l1_current", 70, PointKind::I16),
    point("l2_current", 71, PointKind::I16),
    point("l3_current", 72, PointKind::I16),
    point("current_scale", 73, PointKind::I16),
    point("voltage_ln", 74, PointKind::I16),
    point("l1n_voltage", 75, PointKind::I16),
    point("l2n_voltage", 76, PointKind::I16),
    point("l3n_voltage", 77, PointKind::I16),
    point("voltage_ll", 78, PointKind::I16),
    point("l12_voltage", 79, PointKind::I16),
    point("l23_voltage", 80, PointKind::I16),
    point("l31_voltage", 81, PointKind::I16),
    point("voltage_scale", 82, PointKind::I16),
    point("frequency", 83, PointKind::I16),
    point("frequency_scale", 84, PointKind::I16),
    point("power", 85, PointKind::I16),
    point("l1_power", 86, PointKind::I16),
    point("l2_power", 87, PointKind::I16),
    point("l3_power", 88, PointKind::I16),
    point("power_scale", 89, PointKind::I16),
    point("power_apparent", 90, PointKind::I16),
    point("power_apparent_scale", 94, PointKind::I16),
    point("power_reactive", 95, PointKind::I16),
    point("power_reactive_scale", 99, PointKind::I16),
    point("power_factor", 100, PointKind::I16),
    point("power_factor_scale", 104, PointKind::I16),
    point("export_energy_active", 105, PointKind::U32),
    point("import_energy_active", 113, PointKind::U32),
    point("energy_active_scale", 121, PointKind::I16),
];

/// Up to three meters chained behind the inverter, at fixed bases.
pub static METER_BLOCKS: [RegisterBlock; 3] = [
    RegisterBlock {
        kind: DeviceKind::Meter,
        base: 40_121,
        length: 122,
        points: METER_POINTS,
    },
    RegisterBlock {
        kind: DeviceKind::Meter,
        base: 40_295,
        length: 122,
        points: METER_POINTS,
    },
    RegisterBlock {
        kind: DeviceKind::Meter,
        base: 40_469,
        length: 122,
        points: METER_POINTS,
    },
];

const BATTERY_POINTS: &[Point] = &[
    point("c_manufacturer", 0, PointKind::Str(16)),
    point("c_model", 16, PointKind::Str(16)),
    point("c_version", 32, PointKind::Str(16)),
    point("c_serialnumber", 48, PointKind::Str(16)),
    point("c_deviceaddress", 64, PointKind::U16),
    point("c_sunspec_did", 65, PointKind::U16),
    point("rated_energy", 66, PointKind::F32),
    point("maximum_charge_continuous_power", 68, PointKind::F32),
    point("maximum_discharge_continuous_power", 70, PointKind::F32),
    point("maximum_charge_peak_power", 72, PointKind::F32),
    point("maximum_discharge_peak_power", 74, PointKind::F32),
    point("average_temperature", 106, PointKind::F32),
    point("maximum_temperature", 108, PointKind::F32),
    point("instantaneous_voltage", 110, PointKind::F32),
    point("instantaneous_current", 112, PointKind::F32),
    point("instantaneous_power", 114, PointKind::F32),
    point("available_energy", 122, PointKind::F32),
    point("state_of_health", 130, PointKind::F32),
    point("state_of_charge", 132, PointKind::F32),
    point("status", 134, PointKind::U32),
];

/// Batteries sit in a vendor block outside the SunSpec map.
pub static BATTERY_BLOCKS: [RegisterBlock; 2] = [
    RegisterBlock {
        kind: DeviceKind::Battery,
        base: 57_600,
        length: 136,
        points: BATTERY_POINTS,
    },
    RegisterBlock {
        kind: DeviceKind::Battery,
        base: 57_856,
        length: 136,
        points: BATTERY_POINTS,
    },
];
