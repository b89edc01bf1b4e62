//! Setting catalogue and the typed views the stacks consume

use crate::error::{ConfigError, Result};
use crate::resolver::{Setting, Sources};
use serde::Serialize;

/// Every documented setting
pub mod keys {
    use crate::resolver::SettingKey;

    pub const ENV_NAME: SettingKey = SettingKey {
        name: "env_name",
        context_key: "env",
        env_var: "ENV_NAME",
        default: Some("dev"),
    };

    pub const ACCOUNT: SettingKey = SettingKey {
        name: "account",
        context_key: "account",
        env_var: "CDK_DEFAULT_ACCOUNT",
        default: None,
    };

    pub const REGION: SettingKey = SettingKey {
        name: "region",
        context_key: "region",
        env_var: "CDK_DEFAULT_REGION",
        default: Some("ap-southeast-1"),
    };

    pub const INSTANCE_TYPE: SettingKey = SettingKey {
        name: "instance_type",
        context_key: "instance_type",
        env_var: "INSTANCE_TYPE",
        default: Some("t3.xlarge"),
    };

    pub const NAT_GATEWAYS: SettingKey = SettingKey {
        name: "nat_gateways",
        context_key: "nat_gateways",
        env_var: "NAT_GATEWAYS",
        default: Some("0"),
    };

    pub const MAX_AZS: SettingKey = SettingKey {
        name: "max_azs",
        context_key: "max_azs",
        env_var: "MAX_AZS",
        default: Some("2"),
    };

    /// Default is derived: `{env}-main-bucket-{account}`
    pub const MAIN_BUCKET_NAME: SettingKey = SettingKey {
        name: "main_bucket_name",
        context_key: "main_bucket_name",
        env_var: "MAIN_BUCKET_NAME",
        default: None,
    };

    /// Default is derived: `{env}-log-bucket-{account}`
    pub const LOG_BUCKET_NAME: SettingKey = SettingKey {
        name: "log_bucket_name",
        context_key: "log_bucket_name",
        env_var: "LOG_BUCKET_NAME",
        default: None,
    };

    pub const OIDC_ORG_ID: SettingKey = SettingKey {
        name: "oidc_org_id",
        context_key: "circleci_org_id",
        env_var: "CIRCLECI_ORG_ID",
        default: None,
    };

    pub const OIDC_PROJECT_ID: SettingKey = SettingKey {
        name: "oidc_project_id",
        context_key: "circleci_project_id",
        env_var: "CIRCLECI_PROJECT_ID",
        default: None,
    };

    pub const RESTRICT_TO_PROJECT: SettingKey = SettingKey {
        name: "restrict_to_project",
        context_key: "restrict_to_project",
        env_var: "RESTRICT_TO_PROJECT",
        default: Some("true"),
    };

    pub const OIDC_ISSUER: SettingKey = SettingKey {
        name: "oidc_issuer",
        context_key: "oidc_issuer",
        env_var: "OIDC_ISSUER",
        default: Some("oidc.circleci.com"),
    };

    pub const OIDC_PROVIDER: SettingKey = SettingKey {
        name: "oidc_provider",
        context_key: "oidc_provider",
        env_var: "OIDC_PROVIDER",
        default: Some("existing"),
    };

    pub const APP_MANAGED_POLICIES: SettingKey = SettingKey {
        name: "app_managed_policies",
        context_key: "app_managed_policies",
        env_var: "APP_MANAGED_POLICIES",
        default: Some(""),
    };

    pub const ALL: [SettingKey; 14] = [
        ENV_NAME,
        ACCOUNT,
        REGION,
        INSTANCE_TYPE,
        NAT_GATEWAYS,
        MAX_AZS,
        MAIN_BUCKET_NAME,
        LOG_BUCKET_NAME,
        OIDC_ORG_ID,
        OIDC_PROJECT_ID,
        RESTRICT_TO_PROJECT,
        OIDC_ISSUER,
        OIDC_PROVIDER,
        APP_MANAGED_POLICIES,
    ];
}

/// Settings for the base stack (network, buckets, shared compute role)
#[derive(Debug, Clone, Serialize)]
pub struct BaseSettings {
    pub env_name: String,
    pub account: String,
    pub region: String,
    pub instance_type: String,
    pub nat_gateways: u32,
    pub max_azs: u32,
    pub main_bucket_name: String,
    pub log_bucket_name: String,
    /// Every setting that contributed, with provenance
    pub resolved: Vec<Setting>,
}

impl BaseSettings {
    pub fn resolve(sources: &Sources) -> Result<Self> {
        let env_name = sources.resolve(&keys::ENV_NAME)?;
        let account = sources.resolve(&keys::ACCOUNT)?;
        let region = sources.resolve(&keys::REGION)?;
        let instance_type = sources.resolve(&keys::INSTANCE_TYPE)?;
        let nat_gateways = sources.resolve(&keys::NAT_GATEWAYS)?;
        let max_azs = sources.resolve(&keys::MAX_AZS)?;

        let main_bucket_name = sources.resolve_or(
            &keys::MAIN_BUCKET_NAME,
            &format!("{}-main-bucket-{}", env_name.value, account.value),
        )?;
        let log_bucket_name = sources.resolve_or(
            &keys::LOG_BUCKET_NAME,
            &format!("{}-log-bucket-{}", env_name.value, account.value),
        )?;

        let max_azs_value: u32 = max_azs.parse()?;
        if max_azs_value == 0 {
            return Err(ConfigError::InvalidSetting {
                name: max_azs.name.clone(),
                value: max_azs.value.clone(),
                reason: "at least one availability zone is required".to_string(),
            });
        }

        Ok(Self {
            nat_gateways: nat_gateways.parse()?,
            max_azs: max_azs_value,
            env_name: env_name.value.clone(),
            account: account.value.clone(),
            region: region.value.clone(),
            instance_type: instance_type.value.clone(),
            main_bucket_name: main_bucket_name.value.clone(),
            log_bucket_name: log_bucket_name.value.clone(),
            resolved: vec![
                env_name,
                account,
                region,
                instance_type,
                nat_gateways,
                max_azs,
                main_bucket_name,
                log_bucket_name,
            ],
        })
    }
}

/// How the OIDC identity provider is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OidcProviderMode {
    /// Trust an identity provider that already exists in the account
    Existing,
    /// Provision the identity provider alongside the roles
    Create,
}

impl std::str::FromStr for OidcProviderMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "existing" => Ok(Self::Existing),
            "create" => Ok(Self::Create),
            other => Err(format!("unknown provider mode '{}' (existing, create)", other)),
        }
    }
}

/// Issuer host and path as used in provider URLs and claim keys
///
/// `https://oidc.circleci.com/` and `oidc.circleci.com` are the same issuer.
fn normalize_issuer(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    without_scheme.trim_end_matches('/').to_string()
}

/// Settings for the CI roles stack (OIDC trust, infra and app roles)
#[derive(Debug, Clone, Serialize)]
pub struct CiRoleSettings {
    pub account: String,
    pub region: String,
    pub org_id: String,
    pub project_id: Option<String>,
    pub restrict_to_project: bool,
    pub issuer: String,
    pub provider_mode: OidcProviderMode,
    pub app_managed_policies: Vec<String>,
    /// Every setting that contributed, with provenance
    pub resolved: Vec<Setting>,
}

impl CiRoleSettings {
    pub fn resolve(sources: &Sources) -> Result<Self> {
        // The org id goes first so a missing one is reported before anything else.
        let org_id = sources.resolve(&keys::OIDC_ORG_ID)?;
        let account = sources.resolve(&keys::ACCOUNT)?;
        let region = sources.resolve(&keys::REGION)?;
        let project_id = sources.lookup(&keys::OIDC_PROJECT_ID);
        let restrict = sources.resolve(&keys::RESTRICT_TO_PROJECT)?;
        let issuer = sources.resolve(&keys::OIDC_ISSUER)?;
        let provider_mode = sources.resolve(&keys::OIDC_PROVIDER)?;
        let app_policies = sources.resolve(&keys::APP_MANAGED_POLICIES)?;

        let mut resolved = vec![
            org_id.clone(),
            account.clone(),
            region.clone(),
            restrict.clone(),
            issuer.clone(),
            provider_mode.clone(),
            app_policies.clone(),
        ];
        if let Some(project) = &project_id {
            resolved.push(project.clone());
        }

        Ok(Self {
            account: account.value,
            region: region.value,
            org_id: org_id.value,
            project_id: project_id.map(|s| s.value),
            restrict_to_project: restrict.parse_flag()?,
            issuer: normalize_issuer(&issuer.value),
            provider_mode: provider_mode.parse()?,
            app_managed_policies: app_policies.parse_list(),
            resolved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Provenance;

    fn base_sources() -> Sources {
        Sources::default().with_env("CDK_DEFAULT_ACCOUNT", "123456789012")
    }

    #[test]
    fn test_bucket_names_follow_environment_name() {
        let sources = base_sources().with_env("ENV_NAME", "prod");
        let settings = BaseSettings::resolve(&sources).unwrap();

        assert_eq!(settings.env_name, "prod");
        assert_eq!(settings.main_bucket_name, "prod-main-bucket-123456789012");
        assert_eq!(settings.log_bucket_name, "prod-log-bucket-123456789012");
    }

    #[test]
    fn test_base_defaults() {
        let settings = BaseSettings::resolve(&base_sources()).unwrap();

        assert_eq!(settings.env_name, "dev");
        assert_eq!(settings.region, "ap-southeast-1");
        assert_eq!(settings.instance_type, "t3.xlarge");
        assert_eq!(settings.nat_gateways, 0);
        assert_eq!(settings.max_azs, 2);
        assert_eq!(settings.resolved.len(), 8);
    }

    #[test]
    fn test_bucket_name_override() {
        let sources = base_sources().with_override("main_bucket_name", "shared-assets");
        let settings = BaseSettings::resolve(&sources).unwrap();

        assert_eq!(settings.main_bucket_name, "shared-assets");
        let main = settings
            .resolved
            .iter()
            .find(|s| s.name == "main_bucket_name")
            .unwrap();
        assert_eq!(main.provenance, Provenance::Override);
    }

    #[test]
    fn test_base_requires_account() {
        let err = BaseSettings::resolve(&Sources::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequiredSetting(name) if name == "account"));
    }

    #[test]
    fn test_invalid_nat_gateway_count() {
        let sources = base_sources().with_override("nat_gateways", "many");
        let err = BaseSettings::resolve(&sources).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { name, .. } if name == "nat_gateways"));
    }

    #[test]
    fn test_zero_zones_rejected() {
        let sources = base_sources().with_env("MAX_AZS", "0");
        assert!(BaseSettings::resolve(&sources).is_err());
    }

    #[test]
    fn test_ci_roles_require_org_id_first() {
        // No account either, but the org id is what gets reported.
        let err = CiRoleSettings::resolve(&Sources::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequiredSetting(name) if name == "oidc_org_id"));
    }

    #[test]
    fn test_ci_role_settings() {
        let sources = base_sources()
            .with_override("circleci_org_id", "org-123")
            .with_env("CIRCLECI_PROJECT_ID", "proj-9")
            .with_env("OIDC_PROVIDER", "create")
            .with_override("app_managed_policies", "AmazonECS_FullAccess");
        let settings = CiRoleSettings::resolve(&sources).unwrap();

        assert_eq!(settings.org_id, "org-123");
        assert_eq!(settings.project_id.as_deref(), Some("proj-9"));
        assert!(settings.restrict_to_project);
        assert_eq!(settings.issuer, "oidc.circleci.com");
        assert_eq!(settings.provider_mode, OidcProviderMode::Create);
        assert_eq!(settings.app_managed_policies, vec!["AmazonECS_FullAccess"]);
    }

    #[test]
    fn test_issuer_scheme_and_trailing_slash_are_dropped() {
        for raw in [
            "https://oidc.circleci.com",
            "https://oidc.circleci.com/",
            "oidc.circleci.com/",
            " oidc.circleci.com ",
        ] {
            let sources = base_sources()
                .with_override("circleci_org_id", "org-123")
                .with_env("OIDC_ISSUER", raw);
            let settings = CiRoleSettings::resolve(&sources).unwrap();
            assert_eq!(settings.issuer, "oidc.circleci.com", "issuer {:?}", raw);
        }
    }

    #[test]
    fn test_unknown_provider_mode() {
        let sources = base_sources()
            .with_override("circleci_org_id", "org-123")
            .with_override("oidc_provider", "import");
        let err = CiRoleSettings::resolve(&sources).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { name, .. } if name == "oidc_provider"));
    }
}
