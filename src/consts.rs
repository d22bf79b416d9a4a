use time::macros::offset;
use time::UtcOffset;

pub const IMEI_LENGTH: usize = 15_usize;
pub const COORDINATE_FIELD_WIDTH: usize = 9_usize;
/// Asia/Kolkata has no DST, so a fixed offset is exact.
pub const IST_OFFSET: UtcOffset = offset!(+5:30);

pub const PACKET_PREFIX: &str = "NRM";
pub const PACKET_HEADER: &str = "01L1";
pub const PACKET_TRAILER: &str = "E404x950D2900DC06A72000.00000.0053001811M0827.00airtel";

pub const FORM_FIELD_VLTDATA: &str = "vltdata";
pub const FORM_FIELD_IMEI: &str = "imei";
pub const FORM_FIELD_COMPLIANCE: &str = "compliance";

pub const ENDPOINT_KERALA: &str = "http://103.135.130.119:80";
pub const ENDPOINT_KARNATAKA: &str = "http://210.212.237.164:8088";
pub const ENDPOINT_BENGAL: &str = "http://117.221.20.174:80?vltdata";

pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30_u64;
pub const DEFAULT_INTERVAL_SECS: u64 = 10_u64;
pub const DEFAULT_DURATION_SECS: u64 = 60_u64;
pub const GEOHASH_PRECISION: usize = 7_usize;

/// Substring older revisions reported as success. Logged, never honoured.
pub const SRC_PROPERTY_QUIRK: &str = "src property must be a valid json object";

pub const LABEL_IMEI: &str = "imei";
pub const LABEL_REGION: &str = "region";
pub const LABEL_GEOHASH: &str = "geohash";
pub const LABEL_COMPLIANCE: &str = "compliance";
