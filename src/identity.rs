//! 被监控项目（Identity）的解析。
//!
//! 优先级：显式配置 > 凭据文件中的 project_id > GCE 元数据服务。
//! 后一级仅在前一级没有给出非空值时才会尝试；全部为空则启动失败。

use std::fmt;

use crate::credential::metadata::MetadataServer;
use crate::credential::types::CredentialsFile;
use crate::error::ExporterError;

/// 已解析的项目 ID，保证非空，解析后不再变化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: &str) -> Option<Self> {
        let v = value.trim();
        if v.is_empty() {
            None
        } else {
            Some(Self(v.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 标识 Identity 来自哪一级，仅用于启动日志。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Config,
    CredentialsFile,
    Metadata,
}

pub async fn resolve(
    explicit: &str,
    credentials: Option<&CredentialsFile>,
    metadata: &MetadataServer,
) -> Result<(Identity, IdentitySource), ExporterError> {
    if let Some(id) = Identity::new(explicit) {
        return Ok((id, IdentitySource::Config));
    }

    if let Some(id) = credentials
        .and_then(CredentialsFile::project_id)
        .and_then(Identity::new)
    {
        return Ok((id, IdentitySource::CredentialsFile));
    }

    match metadata.project_id().await {
        Ok(Some(v)) => {
            if let Some(id) = Identity::new(&v) {
                return Ok((id, IdentitySource::Metadata));
            }
        }
        Ok(None) => {}
        Err(e) => tracing::debug!("元数据服务不可用，无法获取项目 ID: {e}"),
    }

    Err(ExporterError::config("empty identity：未配置项目 ID，凭据文件与元数据服务也未提供"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::metadata::tests::metadata_stub;
    use std::time::Duration;

    fn creds(project: &str) -> CredentialsFile {
        CredentialsFile {
            kind: "service_account".to_string(),
            project_id: project.to_string(),
            ..CredentialsFile::default()
        }
    }

    async fn metadata(project: &'static str) -> MetadataServer {
        MetadataServer::new(&metadata_stub(project).await, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn explicit_value_wins_over_every_other_source() {
        let md = metadata("meta-project").await;
        let (id, src) = resolve("  cfg-project ", Some(&creds("file-project")), &md)
            .await
            .unwrap();
        assert_eq!(id.as_str(), "cfg-project");
        assert_eq!(src, IdentitySource::Config);
    }

    #[tokio::test]
    async fn credentials_file_wins_over_metadata() {
        let md = metadata("meta-project").await;
        let (id, src) = resolve("", Some(&creds("file-project")), &md).await.unwrap();
        assert_eq!(id.as_str(), "file-project");
        assert_eq!(src, IdentitySource::CredentialsFile);
    }

    #[tokio::test]
    async fn metadata_is_the_last_resort() {
        let md = metadata("meta-project").await;
        let (id, src) = resolve(" ", Some(&creds("")), &md).await.unwrap();
        assert_eq!(id.as_str(), "meta-project");
        assert_eq!(src, IdentitySource::Metadata);

        let (id, _) = resolve("", None, &md).await.unwrap();
        assert_eq!(id.to_string(), "meta-project");
    }

    #[tokio::test]
    async fn all_sources_empty_is_a_config_error() {
        let md = metadata("").await;
        let err = resolve("", Some(&creds("")), &md).await.unwrap_err();
        assert!(matches!(err, ExporterError::Config(ref m) if m.contains("empty identity")));
    }

    #[tokio::test]
    async fn unreachable_metadata_is_a_config_error() {
        let md = MetadataServer::new("127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = resolve("", None, &md).await.unwrap_err();
        assert!(matches!(err, ExporterError::Config(_)));
    }
}
