use metrics::{counter, describe_counter, describe_gauge, gauge};
use crate::consts;
use crate::packet::{Coordinate, DeviceIdentifier};
use crate::structs::{Compliance, Region};

pub const METRIC_PACKETS_SENT: &str = "vlt_packets_sent";
pub const METRIC_SEND_FAILURES: &str = "vlt_send_failures";
pub const METRIC_LAST_SENT_SECS: &str = "vlt_last_sent_seconds";
pub const METRIC_REGISTRATIONS: &str = "vlt_registrations";
pub const METRIC_REGISTRATION_FAILURES: &str = "vlt_registration_failures";
pub const METRIC_CONTINUOUS_JOBS: &str = "vlt_continuous_jobs";

pub fn register_metrics() {
    describe_counter!(METRIC_PACKETS_SENT, "Location packets accepted by the regional server");
    describe_counter!(METRIC_SEND_FAILURES, "Location packets that failed to send");
    describe_gauge!(METRIC_LAST_SENT_SECS, "Unix time of the last accepted packet for a device and position");

    describe_counter!(METRIC_REGISTRATIONS, "Registration requests accepted by the regional server");
    describe_counter!(METRIC_REGISTRATION_FAILURES, "Registration requests that failed");

    describe_gauge!(METRIC_CONTINUOUS_JOBS, "Continuous sending jobs currently running");
}

fn device_labels(region: Region, imei: &DeviceIdentifier) -> Vec<(&'static str, String)> {
    vec![
        (consts::LABEL_REGION, region.to_string()),
        (consts::LABEL_IMEI, imei.to_string()),
    ]
}

pub fn packet_sent(region: Region, imei: &DeviceIdentifier, position: &Coordinate) {
    let labels = device_labels(region, imei);
    counter!(METRIC_PACKETS_SENT, &labels).increment(1);
    let mut with_position = labels.clone();
    if let Some(hash) = position.geohash() {
        with_position.push((consts::LABEL_GEOHASH, hash));
    }
    gauge!(METRIC_LAST_SENT_SECS, &with_position).set(crate::get_secs() as f64);
}

pub fn packet_failed(region: Region, imei: &DeviceIdentifier) {
    counter!(METRIC_SEND_FAILURES, &device_labels(region, imei)).increment(1);
}

pub fn registration(region: Region, compliance: Compliance, accepted: bool) {
    let labels = vec![
        (consts::LABEL_REGION, region.to_string()),
        (consts::LABEL_COMPLIANCE, compliance.to_string()),
    ];
    if accepted {
        counter!(METRIC_REGISTRATIONS, &labels).increment(1);
    } else {
        counter!(METRIC_REGISTRATION_FAILURES, &labels).increment(1);
    }
}

pub fn continuous_job_started() {
    gauge!(METRIC_CONTINUOUS_JOBS).increment(1.0);
}

pub fn continuous_job_finished() {
    gauge!(METRIC_CONTINUOUS_JOBS).decrement(1.0);
}
