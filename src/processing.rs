use std::time::Duration;
use reqwest::Url;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use crate::app_metrics;
use crate::dispatcher::{note_known_quirk, record_failed, record_sent, Dispatcher, JobReport, SendJob};
use crate::extract::extract;
use crate::packet::{Coordinate, DeviceIdentifier, Packet};
use crate::session::{Action, Session, Status};
use crate::structs::{AppConfig, Compliance, Region};

/// Where a device's IMEI and position come from.
#[derive(Debug, Clone)]
pub enum DeviceInput {
    Manual {
        imei: String,
        latitude: String,
        longitude: String,
    },
    Format(String),
}

#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub interval: Duration,
    pub duration: Duration,
}

fn resolve_endpoint(config: &AppConfig, session: &mut Session, action: Action, region: Region) -> Option<Url> {
    match config.endpoint(region) {
        Ok(url) => Some(url),
        Err(e) => {
            session.log_activity(action, Status::Failed, format!("Region: {region}, Error: {e}"));
            session.log_error(action, e.to_string());
            None
        }
    }
}

fn resolve_device(session: &mut Session, action: Action, input: DeviceInput) -> Option<(DeviceIdentifier, Coordinate)> {
    match input {
        DeviceInput::Manual { imei, latitude, longitude } => {
            let imei = match DeviceIdentifier::parse(&imei) {
                Ok(imei) => imei,
                Err(_) => {
                    session.log_activity(action, Status::Failed, format!("Invalid IMEI: {imei}"));
                    return None;
                }
            };
            match Coordinate::parse(&latitude, &longitude) {
                Ok(position) => Some((imei, position)),
                Err(e) => {
                    session.log_activity(action, Status::Failed, format!("IMEI: {imei}, Error: {e}"));
                    None
                }
            }
        }
        DeviceInput::Format(text) => match extract(&text) {
            Ok(found) => Some((found.imei, found.position)),
            Err(e) => {
                session.log_error(Action::ExtractData, e.to_string());
                session.log_activity(action, Status::Failed, "Failed to extract data from format");
                None
            }
        },
    }
}

async fn send_one(
    dispatcher: &Dispatcher,
    session: &mut Session,
    action: Action,
    region: Region,
    endpoint: &Url,
    imei: &DeviceIdentifier,
    position: &Coordinate,
) -> bool {
    let details = format!("IMEI: {imei}, Position: {position}");
    let sent = match Packet::build(imei, position, OffsetDateTime::now_utc()) {
        Ok(packet) => dispatcher.send(&packet, endpoint).await.map(|r| (packet, r)),
        Err(e) => Err(e),
    };
    match sent {
        Ok((packet, response)) => {
            record_sent(session, action, region, imei, position, &packet, &response);
            true
        }
        Err(e) => {
            record_failed(session, action, region, imei, details, &e);
            false
        }
    }
}

pub async fn process_registration(
    config: &AppConfig,
    dispatcher: &Dispatcher,
    session: &mut Session,
    region: Region,
    imei: &str,
    compliance: Compliance,
) -> bool {
    let action = Action::SendRequest;
    let imei = match DeviceIdentifier::parse(imei) {
        Ok(imei) => imei,
        Err(_) => {
            session.log_activity(action, Status::Failed, format!("Invalid IMEI: {imei}"));
            return false;
        }
    };
    let Some(endpoint) = resolve_endpoint(config, session, action, region) else { return false };

    info!("Registering {imei} with {region} ({compliance})");
    match dispatcher.register(&imei, compliance, &endpoint).await {
        Ok(response) => {
            app_metrics::registration(region, compliance, true);
            session.log_activity(
                action,
                Status::Success,
                format!("IMEI: {imei}, Compliance: {compliance}, Response: {}", response.body),
            );
            true
        }
        Err(e) => {
            app_metrics::registration(region, compliance, false);
            note_known_quirk(&e);
            session.log_activity(action, Status::Failed, format!("IMEI: {imei}, Compliance: {compliance}, Error: {e}"));
            session.log_error(action, e.to_string());
            false
        }
    }
}

/// Sends one packet per comma-separated IMEI, all at the same position.
/// Bad entries are logged and skipped. Returns how many packets were accepted.
pub async fn process_manual(
    config: &AppConfig,
    dispatcher: &Dispatcher,
    session: &mut Session,
    region: Region,
    imeis: &str,
    latitude: &str,
    longitude: &str,
) -> usize {
    let action = Action::SendManualData;
    let position = match Coordinate::parse(latitude, longitude) {
        Ok(position) => position,
        Err(e) => {
            session.log_activity(action, Status::Failed, format!("Latitude: {latitude}, Longitude: {longitude}, Error: {e}"));
            return 0;
        }
    };
    let Some(endpoint) = resolve_endpoint(config, session, action, region) else { return 0 };

    let mut accepted = 0_usize;
    for raw in imeis.split(',').map(str::trim) {
        let imei = match DeviceIdentifier::parse(raw) {
            Ok(imei) => imei,
            Err(_) => {
                session.log_activity(action, Status::Failed, format!("Invalid IMEI: {raw}"));
                continue;
            }
        };
        if send_one(dispatcher, session, action, region, &endpoint, &imei, &position).await {
            accepted += 1;
        }
    }
    accepted
}

pub async fn process_extracted(
    config: &AppConfig,
    dispatcher: &Dispatcher,
    session: &mut Session,
    region: Region,
    text: &str,
) -> bool {
    let action = Action::SendManualData;
    let Some((imei, position)) = resolve_device(session, action, DeviceInput::Format(text.to_string())) else {
        return false;
    };
    let Some(endpoint) = resolve_endpoint(config, session, action, region) else { return false };
    send_one(dispatcher, session, action, region, &endpoint, &imei, &position).await
}

/// Runs a continuous job on its own task and waits for it. The session is
/// handed to the task and returned when the job ends.
pub async fn process_continuous(
    config: &AppConfig,
    dispatcher: &Dispatcher,
    session: &mut Session,
    region: Region,
    input: DeviceInput,
    schedule: Schedule,
    cancel: CancellationToken,
) -> Option<JobReport> {
    let action = Action::ContinuousSending;
    let (imei, position) = resolve_device(session, action, input)?;
    let endpoint = resolve_endpoint(config, session, action, region)?;
    let job = SendJob::new(region, imei, position, endpoint, schedule.interval, schedule.duration, cancel);
    let dispatcher = dispatcher.clone();
    let mut task_session = std::mem::take(session);
    let handle = tokio::spawn(async move {
        let report = dispatcher.send_continuous(job, &mut task_session).await;
        (report, task_session)
    });
    match handle.await {
        Ok((report, returned)) => {
            *session = returned;
            Some(report)
        }
        Err(e) => {
            error!("Continuous sending task died: {e}");
            session.log_error(action, format!("background task failed: {e}"));
            None
        }
    }
}
