use std::fmt;
use std::time::Duration;
use reqwest::Url;
use strum::Display;
use time::OffsetDateTime;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use crate::consts::{self, FORM_FIELD_COMPLIANCE, FORM_FIELD_IMEI, FORM_FIELD_VLTDATA};
use crate::errors::VltError;
use crate::packet::{Coordinate, DeviceIdentifier, Packet};
use crate::session::{Action, Session, Status};
use crate::structs::{Compliance, Region};
use crate::app_metrics;

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

impl fmt::Display for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Json(v) => write!(f, "{v}"),
            ResponseBody::Text(t) => f.write_str(t),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendResult {
    pub status: u16,
    pub body: ResponseBody,
}

/// Everything a background continuous send needs. Owned by the task running it.
#[derive(Debug)]
pub struct SendJob {
    pub region: Region,
    pub imei: DeviceIdentifier,
    pub position: Coordinate,
    pub endpoint: Url,
    pub interval: Duration,
    pub end_time: Instant,
    pub cancel: CancellationToken,
}

impl SendJob {
    pub fn new(
        region: Region,
        imei: DeviceIdentifier,
        position: Coordinate,
        endpoint: Url,
        interval: Duration,
        duration: Duration,
        cancel: CancellationToken,
    ) -> SendJob {
        SendJob {
            region,
            imei,
            position,
            endpoint,
            interval,
            end_time: Instant::now() + duration,
            cancel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum JobOutcome {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobReport {
    pub outcome: JobOutcome,
    pub attempted: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
}

impl Dispatcher {
    pub fn new(timeout: Duration) -> Result<Dispatcher, VltError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Dispatcher { client })
    }

    pub async fn send(&self, packet: &Packet, endpoint: &Url) -> Result<SendResult, VltError> {
        debug!("Posting packet {packet} to {endpoint}");
        self.post_form(endpoint, &[(FORM_FIELD_VLTDATA, packet.as_str())]).await
    }

    pub async fn register(
        &self,
        imei: &DeviceIdentifier,
        compliance: Compliance,
        endpoint: &Url,
    ) -> Result<SendResult, VltError> {
        debug!("Posting registration for {imei} ({compliance}) to {endpoint}");
        let compliance = compliance.to_string();
        self.post_form(endpoint, &[(FORM_FIELD_IMEI, imei.as_str()), (FORM_FIELD_COMPLIANCE, compliance.as_str())])
            .await
    }

    async fn post_form(&self, endpoint: &Url, form: &[(&str, &str)]) -> Result<SendResult, VltError> {
        let response = self.client.post(endpoint.clone()).form(form).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(VltError::SendFailure {
                reason: format!("HTTP {status} from {endpoint}: {text}"),
            });
        }
        let body = match serde_json::from_str(&text) {
            Ok(v) => ResponseBody::Json(v),
            Err(_) => ResponseBody::Text(text),
        };
        Ok(SendResult {
            status: status.as_u16(),
            body,
        })
    }

    /// Sends a fresh packet for the job's device every `interval` until the
    /// job's end time passes or its token is cancelled. An in-flight request
    /// is always allowed to finish.
    pub async fn send_continuous(&self, job: SendJob, session: &mut Session) -> JobReport {
        let started = Instant::now();
        let mut attempted = 0_usize;
        let mut failed = 0_usize;
        app_metrics::continuous_job_started();
        info!(
            "Continuous sending for {} to {} every {}",
            job.imei,
            job.endpoint,
            pretty_duration::pretty_duration(&job.interval, None)
        );

        let outcome = loop {
            if job.cancel.is_cancelled() {
                break JobOutcome::Cancelled;
            }
            if Instant::now() >= job.end_time {
                break JobOutcome::Completed;
            }

            attempted += 1;
            let details = format!("IMEI: {}, Position: {}", job.imei, job.position);
            let result = match Packet::build(&job.imei, &job.position, OffsetDateTime::now_utc()) {
                Ok(packet) => self.send(&packet, &job.endpoint).await.map(|r| (packet, r)),
                Err(e) => Err(e),
            };
            match result {
                Ok((packet, response)) => {
                    record_sent(session, Action::ContinuousSending, job.region, &job.imei, &job.position, &packet, &response);
                }
                Err(e) => {
                    failed += 1;
                    record_failed(session, Action::ContinuousSending, job.region, &job.imei, details, &e);
                }
            }

            let wake = (Instant::now() + job.interval).min(job.end_time);
            tokio::select! {
                _ = job.cancel.cancelled() => {}
                _ = tokio::time::sleep_until(wake) => {}
            }
        };

        app_metrics::continuous_job_finished();
        let elapsed = started.elapsed();
        let summary = format!(
            "{outcome} after {attempted} sends ({failed} failed) in {}",
            pretty_duration::pretty_duration(&elapsed, None)
        );
        let status = match outcome {
            JobOutcome::Completed => Status::Completed,
            JobOutcome::Cancelled => Status::Cancelled,
        };
        session.log_activity(Action::ContinuousSending, status, summary);
        JobReport {
            outcome,
            attempted,
            failed,
            elapsed,
        }
    }
}

pub(crate) fn record_sent(
    session: &mut Session,
    action: Action,
    region: Region,
    imei: &DeviceIdentifier,
    position: &Coordinate,
    packet: &Packet,
    response: &SendResult,
) {
    app_metrics::packet_sent(region, imei, position);
    session.log_activity(
        action,
        Status::Success,
        format!("IMEI: {imei}, Position: {position}, Packet: {packet}, Response: {}", response.body),
    );
}

pub(crate) fn record_failed(
    session: &mut Session,
    action: Action,
    region: Region,
    imei: &DeviceIdentifier,
    details: String,
    err: &VltError,
) {
    app_metrics::packet_failed(region, imei);
    note_known_quirk(err);
    session.log_activity(action, Status::Failed, format!("{details}, Error: {err}"));
    session.log_error(action, err.to_string());
}

/// Older tools reported this failure as a success; it is kept a failure here.
pub(crate) fn note_known_quirk(err: &VltError) {
    if err.to_string().contains(consts::SRC_PROPERTY_QUIRK) {
        warn!("Server replied {:?}; this used to be treated as success but is counted as a failure", consts::SRC_PROPERTY_QUIRK);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{closed_endpoint, spawn_endpoint};
    use serde_json::json;

    const IMEI: &str = "123456789012345";

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Duration::from_secs(5)).unwrap()
    }

    fn packet() -> Packet {
        let position = Coordinate::new(10.5, 76.25).unwrap();
        crate::packet::encode(IMEI, &position, OffsetDateTime::now_utc()).unwrap()
    }

    fn job(url: &str, interval: Duration, duration: Duration, cancel: CancellationToken) -> SendJob {
        SendJob::new(
            Region::Kerala,
            DeviceIdentifier::parse(IMEI).unwrap(),
            Coordinate::new(10.5, 76.25).unwrap(),
            Url::parse(url).unwrap(),
            interval,
            duration,
            cancel,
        )
    }

    #[tokio::test]
    async fn json_response_is_parsed() {
        let mut endpoint = spawn_endpoint(200, r#"{"ok":true}"#).await;
        let url = Url::parse(&endpoint.url).unwrap();
        let packet = packet();
        let result = dispatcher().send(&packet, &url).await.unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(result.body, ResponseBody::Json(json!({"ok": true})));

        let request = endpoint.requests.recv().await.unwrap();
        assert!(request.head.starts_with("POST / "));
        assert_eq!(request.header("content-type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(request.body, format!("vltdata={}", packet.as_str()));
    }

    #[tokio::test]
    async fn text_response_is_kept_raw() {
        let endpoint = spawn_endpoint(200, "Data received").await;
        let url = Url::parse(&endpoint.url).unwrap();
        let result = dispatcher().send(&packet(), &url).await.unwrap();
        assert_eq!(result.body, ResponseBody::Text("Data received".to_string()));
    }

    #[tokio::test]
    async fn server_error_is_a_send_failure() {
        let endpoint = spawn_endpoint(500, "oops").await;
        let url = Url::parse(&endpoint.url).unwrap();
        let err = dispatcher().send(&packet(), &url).await.unwrap_err();
        match err {
            VltError::SendFailure { reason } => {
                assert!(reason.contains("500"));
                assert!(reason.contains("oops"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_is_a_send_failure() {
        let url = Url::parse(&closed_endpoint().await).unwrap();
        assert!(matches!(
            dispatcher().send(&packet(), &url).await,
            Err(VltError::SendFailure { .. })
        ));
    }

    #[tokio::test]
    async fn registration_form() {
        let mut endpoint = spawn_endpoint(200, r#"{"status":"registered"}"#).await;
        let url = Url::parse(&endpoint.url).unwrap();
        let imei = DeviceIdentifier::parse(IMEI).unwrap();
        dispatcher().register(&imei, Compliance::Ais, &url).await.unwrap();
        let request = endpoint.requests.recv().await.unwrap();
        assert_eq!(request.body, "imei=123456789012345&compliance=AIS");
    }

    #[tokio::test]
    async fn cancel_after_first_send_stops_the_job() {
        let mut endpoint = spawn_endpoint(200, r#"{"ok":true}"#).await;
        let cancel = CancellationToken::new();
        let job = job(&endpoint.url, Duration::from_secs(10), Duration::from_secs(60), cancel.clone());
        let dispatcher = dispatcher();
        let handle = tokio::spawn(async move {
            let mut session = Session::new();
            let report = dispatcher.send_continuous(job, &mut session).await;
            (report, session)
        });

        endpoint.requests.recv().await.unwrap();
        cancel.cancel();
        let (report, session) = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

        assert_eq!(report.outcome, JobOutcome::Cancelled);
        assert_eq!(report.attempted, 1);
        assert_eq!(report.failed, 0);
        assert!(endpoint.requests.try_recv().is_err());
        assert_eq!(session.count(Status::Success), 1);
        assert_eq!(session.activity().last().unwrap().status, Status::Cancelled);
    }

    #[tokio::test]
    async fn job_completes_when_duration_elapses() {
        let endpoint = spawn_endpoint(200, "ok").await;
        let job = job(&endpoint.url, Duration::from_millis(100), Duration::from_millis(350), CancellationToken::new());
        let mut session = Session::new();
        let report = dispatcher().send_continuous(job, &mut session).await;
        assert_eq!(report.outcome, JobOutcome::Completed);
        assert!(report.attempted >= 2 && report.attempted <= 4, "attempted {}", report.attempted);
        assert_eq!(report.failed, 0);
        assert_eq!(session.count(Status::Success), report.attempted);
        assert_eq!(session.activity().last().unwrap().status, Status::Completed);
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_job() {
        let endpoint = spawn_endpoint(500, "down").await;
        let job = job(&endpoint.url, Duration::from_millis(50), Duration::from_millis(200), CancellationToken::new());
        let mut session = Session::new();
        let report = dispatcher().send_continuous(job, &mut session).await;
        assert_eq!(report.outcome, JobOutcome::Completed);
        assert!(report.attempted >= 2);
        assert_eq!(report.failed, report.attempted);
        assert_eq!(session.errors().len(), report.failed);
    }

    #[tokio::test]
    async fn already_cancelled_job_sends_nothing() {
        let mut endpoint = spawn_endpoint(200, "ok").await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let job = job(&endpoint.url, Duration::from_secs(1), Duration::from_secs(60), cancel);
        let report = dispatcher().send_continuous(job, &mut Session::new()).await;
        assert_eq!(report.outcome, JobOutcome::Cancelled);
        assert_eq!(report.attempted, 0);
        assert!(endpoint.requests.try_recv().is_err());
    }
}
