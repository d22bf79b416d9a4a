use std::fmt;
use std::str::FromStr;
use time::macros::format_description;
use time::OffsetDateTime;
use crate::consts;
use crate::errors::VltError;

/// A validated 15-digit IMEI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentifier(String);

impl DeviceIdentifier {
    pub fn parse(raw: &str) -> Result<DeviceIdentifier, VltError> {
        if raw.len() != consts::IMEI_LENGTH || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VltError::InvalidIdentifier(raw.to_string()));
        }
        Ok(DeviceIdentifier(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DeviceIdentifier {
    type Err = VltError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceIdentifier::parse(s)
    }
}

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Coordinate, VltError> {
        if !latitude.is_finite() || !(0.0..=90.0).contains(&latitude) {
            return Err(VltError::InvalidCoordinate(format!("latitude {latitude} outside 0..=90")));
        }
        if !longitude.is_finite() || !(0.0..100.0).contains(&longitude) {
            return Err(VltError::InvalidCoordinate(format!("longitude {longitude} outside 0..100")));
        }
        // rounding to 6 digits can still carry into a third integer digit
        for value in [latitude, longitude] {
            let field = format_degrees(value);
            if field.len() != consts::COORDINATE_FIELD_WIDTH {
                return Err(VltError::InvalidCoordinate(format!("{value} renders as {field}")));
            }
        }
        Ok(Coordinate { latitude, longitude })
    }

    pub fn parse(latitude: &str, longitude: &str) -> Result<Coordinate, VltError> {
        let lat = parse_degrees(latitude)?;
        let lon = parse_degrees(longitude)?;
        Coordinate::new(lat, lon)
    }

    pub fn latitude_field(&self) -> String {
        format_degrees(self.latitude)
    }

    pub fn longitude_field(&self) -> String {
        format_degrees(self.longitude)
    }

    pub fn geohash(&self) -> Option<String> {
        let coord = geohash::Coord {
            x: self.longitude,
            y: self.latitude,
        };
        geohash::encode(coord, consts::GEOHASH_PRECISION).ok()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude_field(), self.longitude_field())
    }
}

fn parse_degrees(raw: &str) -> Result<f64, VltError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| VltError::InvalidCoordinate(format!("{raw:?}: {e}")))
}

/// Renders degrees as 9 characters with 6 fraction digits, zero padded.
pub fn format_degrees(value: f64) -> String {
    format!("{value:09.6}")
}

/// One rendered VLT location packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet(String);

impl Packet {
    pub fn build(imei: &DeviceIdentifier, position: &Coordinate, at: OffsetDateTime) -> Result<Packet, VltError> {
        let local = at.to_offset(consts::IST_OFFSET);
        let date = local.format(format_description!("[day][month][year repr:last_two]"))?;
        let clock = local.format(format_description!("[hour][minute][second]"))?;
        Ok(Packet(format!(
            "{}{}{}{}{}0{}N0{}{}",
            consts::PACKET_PREFIX,
            imei,
            consts::PACKET_HEADER,
            date,
            clock,
            position.latitude_field(),
            position.longitude_field(),
            consts::PACKET_TRAILER,
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn encode(imei: &str, position: &Coordinate, at: OffsetDateTime) -> Result<Packet, VltError> {
    let imei = DeviceIdentifier::parse(imei)?;
    Packet::build(&imei, position, at)
}
