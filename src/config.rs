//! Run configuration.
//!
//! Values come from the environment (after `.env` is loaded with `dotenv`),
//! one `MESH_*` variable per key. A missing key takes its default silently;
//! a value that does not parse takes its default with a warning.

use crate::models::Ipv4;
use regex::Regex;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::OnceLock;

pub const ENV_PREFIX: &str = "MESH_";

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_BUCKET_NAME: &str = "region-mesh-state";
pub const DEFAULT_PUBLIC_KEY: &str = "ssh-ed25519 AAAA-placeholder region-mesh";
pub const DEFAULT_VPC_CIDR: Ipv4 = Ipv4 {
    addr: Ipv4Addr::new(10, 0, 0, 0),
    mask: 16,
};
pub const DEFAULT_INSTANCE_TYPE: &str = "t3.medium";
pub const DEFAULT_PLAN_FILE: &str = "plan.json";

/// Zones used per region; the first N available ones are taken.
pub const ZONES_PER_REGION: usize = 2;
/// Root volume of the compute instance, in GiB.
pub const ROOT_VOLUME_GIB: u32 = 20;

static REGION_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_region_regex() -> &'static Regex {
    REGION_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z]{2}(-gov)?-[a-z]+-\d$").expect("Invalid Regex")
    })
}

/// Whether `region` looks like an AWS region name, e.g. `eu-west-3`.
pub fn is_region_name(region: &str) -> bool {
    get_region_regex().is_match(region)
}

/// Settings for one provisioning pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `awsRegions`: comma-separated list.
    pub regions: Vec<String>,
    /// `s3BucketRegion`
    pub bucket_region: String,
    /// `s3BucketName`
    pub bucket_name: String,
    /// `publicKey`: SSH public key installed as the per-region key pair.
    pub public_key: String,
    /// `vpcCidr`
    pub vpc_cidr: Ipv4,
    /// `extended`: add private subnets, instance, IAM and the state bucket.
    pub extended: bool,
    /// `instanceType`
    pub instance_type: String,
    /// `offline`: use static lookups instead of the `aws` CLI.
    pub offline: bool,
    /// `lookupCache`: cache file for lookups, today's default file if unset.
    pub lookup_cache: Option<String>,
    /// `planFile`
    pub plan_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            regions: vec![DEFAULT_REGION.to_string()],
            bucket_region: DEFAULT_REGION.to_string(),
            bucket_name: DEFAULT_BUCKET_NAME.to_string(),
            public_key: DEFAULT_PUBLIC_KEY.to_string(),
            vpc_cidr: DEFAULT_VPC_CIDR,
            extended: false,
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            offline: false,
            lookup_cache: None,
            plan_file: DEFAULT_PLAN_FILE.to_string(),
        }
    }
}

/// Environment variable name for a config key: `awsRegions` -> `MESH_AWS_REGIONS`.
pub fn env_var_name(key: &str) -> String {
    let mut name = String::from(ENV_PREFIX);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            name.push('_');
        }
        name.push(c.to_ascii_uppercase());
    }
    name
}

impl Config {
    /// Read from `MESH_*` environment variables.
    pub fn from_env() -> Config {
        Config::from_lookup(|key| std::env::var(env_var_name(key)).ok())
    }

    /// Read through `get`, which maps a config key to its raw value.
    pub fn from_lookup<F>(get: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let config = Config {
            regions: parse_or(
                "awsRegions",
                get("awsRegions"),
                parse_regions,
                defaults.regions,
            ),
            bucket_region: parse_or(
                "s3BucketRegion",
                get("s3BucketRegion"),
                parse_region,
                defaults.bucket_region,
            ),
            bucket_name: parse_or(
                "s3BucketName",
                get("s3BucketName"),
                parse_bucket_name,
                defaults.bucket_name,
            ),
            public_key: parse_or(
                "publicKey",
                get("publicKey"),
                parse_non_empty,
                defaults.public_key,
            ),
            vpc_cidr: parse_or("vpcCidr", get("vpcCidr"), parse_vpc_cidr, defaults.vpc_cidr),
            extended: parse_or("extended", get("extended"), parse_bool, defaults.extended),
            instance_type: parse_or(
                "instanceType",
                get("instanceType"),
                parse_non_empty,
                defaults.instance_type,
            ),
            offline: parse_or("offline", get("offline"), parse_bool, defaults.offline),
            lookup_cache: get("lookupCache").filter(|s| !s.trim().is_empty()),
            plan_file: parse_or(
                "planFile",
                get("planFile"),
                parse_non_empty,
                defaults.plan_file,
            ),
        };
        log::info!(
            "config: regions={:?} extended={} offline={} bucket={} ({})",
            config.regions,
            config.extended,
            config.offline,
            config.bucket_name,
            config.bucket_region
        );
        config
    }
}

/// Missing -> default silently, unparsable -> default with a warning.
fn parse_or<T, F>(key: &str, raw: Option<String>, parse: F, default: T) -> T
where
    T: std::fmt::Debug,
    F: Fn(&str) -> Result<T, String>,
{
    match raw {
        None => {
            log::debug!("config {key} not set, using default {default:?}");
            default
        }
        Some(raw) => match parse(raw.trim()) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("config {key}='{raw}' ignored ({e}), using default {default:?}");
                default
            }
        },
    }
}

fn parse_region(raw: &str) -> Result<String, String> {
    if is_region_name(raw) {
        Ok(raw.to_string())
    } else {
        Err(format!("'{raw}' is not a region name"))
    }
}

fn parse_regions(raw: &str) -> Result<Vec<String>, String> {
    let regions: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(parse_region)
        .collect::<Result<_, _>>()?;
    if regions.is_empty() {
        return Err("no regions listed".to_string());
    }
    let mut unique: Vec<String> = Vec::with_capacity(regions.len());
    for region in regions {
        if unique.contains(&region) {
            log::warn!("config awsRegions lists {region} more than once, keeping the first");
        } else {
            unique.push(region);
        }
    }
    Ok(unique)
}

fn parse_bucket_name(raw: &str) -> Result<String, String> {
    let valid = (3..=63).contains(&raw.len())
        && raw
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && !raw.starts_with(['-', '.'])
        && !raw.ends_with(['-', '.']);
    if valid {
        Ok(raw.to_string())
    } else {
        Err(format!("'{raw}' is not a valid bucket name"))
    }
}

fn parse_vpc_cidr(raw: &str) -> Result<Ipv4, String> {
    let cidr = Ipv4::from_str(raw).map_err(|e| e.to_string())?;
    // The VPC is split into four subnets, which must stay within /28 or larger.
    if !(16..=26).contains(&cidr.mask) {
        return Err(format!("VPC prefix /{} outside /16../26", cidr.mask));
    }
    Ok(cidr.network())
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("'{other}' is not a boolean")),
    }
}

fn parse_non_empty(raw: &str) -> Result<String, String> {
    if raw.is_empty() {
        Err("empty value".to_string())
    } else {
        Ok(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::sync::Once;

    thread_local! {
        static CAPTURED: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
    }

    /// Records log lines per test thread.
    struct CaptureLogger;

    impl log::Log for CaptureLogger {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            CAPTURED.with(|c| {
                c.borrow_mut()
                    .push((record.level(), record.args().to_string()))
            });
        }

        fn flush(&self) {}
    }

    static LOGGER: CaptureLogger = CaptureLogger;

    fn capture_logs<F: FnOnce()>(f: F) -> Vec<(Level, String)> {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            log::set_logger(&LOGGER).expect("logger already set");
            log::set_max_level(log::LevelFilter::Debug);
        });
        CAPTURED.with(|c| c.borrow_mut().clear());
        f();
        CAPTURED.with(|c| c.borrow_mut().drain(..).collect())
    }

    fn warnings(logs: &[(Level, String)]) -> Vec<&str> {
        logs.iter()
            .filter(|(level, _)| *level == Level::Warn)
            .map(|(_, line)| line.as_str())
            .collect()
    }

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_unset_regions_defaults_to_one_region() {
        let config = config_from(&[]);
        assert_eq!(config.regions, vec!["us-east-1"]);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_regions_comma_separated() {
        let config = config_from(&[("awsRegions", " us-east-1, us-west-2 ,eu-west-3,")]);
        assert_eq!(config.regions, vec!["us-east-1", "us-west-2", "eu-west-3"]);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config_from(&[
            ("awsRegions", "us-east-1,mars-north"),
            ("s3BucketRegion", "Nowhere"),
            ("extended", "maybe"),
            ("vpcCidr", "10.0.0.0/30"),
            ("s3BucketName", "Bad_Bucket"),
            ("publicKey", "  "),
        ]);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_empty_region_list_rejected() {
        assert!(parse_regions(" , ").is_err());
        assert!(parse_regions("us-gov-west-1").is_ok());
    }

    #[test]
    fn test_repeated_regions_keep_first() {
        let config = config_from(&[("awsRegions", "us-west-2,us-west-2")]);
        assert_eq!(config.regions, vec!["us-west-2"]);
        let config = config_from(&[("awsRegions", "eu-west-3,us-west-2,eu-west-3")]);
        assert_eq!(config.regions, vec!["eu-west-3", "us-west-2"]);
    }

    #[test]
    fn test_typed_values() {
        let config = config_from(&[
            ("extended", "TRUE"),
            ("offline", "1"),
            ("vpcCidr", "10.42.7.0/16"),
            ("s3BucketName", "my-state.bucket"),
            ("instanceType", "t3.small"),
            ("lookupCache", "cache.json"),
        ]);
        assert!(config.extended);
        assert!(config.offline);
        assert_eq!(config.vpc_cidr.to_string(), "10.42.0.0/16");
        assert_eq!(config.bucket_name, "my-state.bucket");
        assert_eq!(config.instance_type, "t3.small");
        assert_eq!(config.lookup_cache.as_deref(), Some("cache.json"));
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name("awsRegions"), "MESH_AWS_REGIONS");
        assert_eq!(env_var_name("s3BucketRegion"), "MESH_S3_BUCKET_REGION");
        assert_eq!(env_var_name("extended"), "MESH_EXTENDED");
    }

    #[test]
    fn test_unparsable_value_warns() {
        let logs = capture_logs(|| {
            let config = config_from(&[("extended", "maybe")]);
            assert!(!config.extended);
        });
        let warned = warnings(&logs);
        assert_eq!(warned.len(), 1, "{logs:?}");
        assert!(warned[0].contains("extended='maybe'"));
        assert!(warned[0].contains("using default false"));
    }

    #[test]
    fn test_missing_value_does_not_warn() {
        let logs = capture_logs(|| {
            config_from(&[]);
        });
        assert!(warnings(&logs).is_empty(), "{logs:?}");
        assert!(logs
            .iter()
            .any(|(level, line)| *level == Level::Debug && line.contains("awsRegions not set")));
    }

    #[test]
    fn test_repeated_region_warns() {
        let logs = capture_logs(|| {
            config_from(&[("awsRegions", "us-west-2,us-west-2")]);
        });
        let warned = warnings(&logs);
        assert_eq!(warned.len(), 1, "{logs:?}");
        assert!(warned[0].contains("us-west-2 more than once"));
    }

    #[test]
    fn test_default_cidr() {
        assert_eq!(DEFAULT_VPC_CIDR.to_string(), "10.0.0.0/16");
        assert_eq!(Config::default().vpc_cidr, DEFAULT_VPC_CIDR);
    }
}
