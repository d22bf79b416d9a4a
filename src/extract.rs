use lazy_static::lazy_static;
use regex::Regex;
use crate::errors::VltError;
use crate::packet::{Coordinate, DeviceIdentifier};

lazy_static! {
    static ref IMEI_RE: Regex = Regex::new(r"#(\d{15})#").unwrap();
    static ref LATITUDE_RE: Regex = Regex::new(r"#(\d+\.\d+),N,").unwrap();
    static ref LONGITUDE_RE: Regex = Regex::new(r",N,(\d+\.\d+),E,").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub imei: DeviceIdentifier,
    pub position: Coordinate,
}

fn capture<'a>(re: &Regex, text: &'a str, what: &str) -> Result<&'a str, VltError> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| VltError::ExtractionFailure(format!("no {what} found")))
}

/// Pulls the IMEI and position out of a raw device sentence such as
/// `#123456789012345#10.5000,N,76.2500,E,`.
pub fn extract(text: &str) -> Result<Extracted, VltError> {
    let imei = capture(&IMEI_RE, text, "IMEI")?;
    let latitude = capture(&LATITUDE_RE, text, "latitude")?;
    let longitude = capture(&LONGITUDE_RE, text, "longitude")?;
    let imei = DeviceIdentifier::parse(imei).map_err(|e| VltError::ExtractionFailure(e.to_string()))?;
    let position = Coordinate::parse(latitude, longitude).map_err(|e| VltError::ExtractionFailure(e.to_string()))?;
    Ok(Extracted { imei, position })
}
