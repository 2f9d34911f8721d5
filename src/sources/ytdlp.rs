use async_trait::async_trait;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use super::{ResolveError, SourceResolver, TrackDescriptor};

const YTDLP_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolver basado en yt-dlp: extrae metadata sin descargar nada.
///
/// Para texto libre delega en `ytsearch1:` y se queda con el primer
/// resultado; para URLs pide la metadata del video directamente.
pub struct YtDlpResolver {
    timeout: Duration,
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self {
            timeout: YTDLP_TIMEOUT,
        }
    }

    fn target_for(query: &str) -> Result<String, ResolveError> {
        if query.starts_with("http://") || query.starts_with("https://") {
            let parsed = Url::parse(query)
                .map_err(|_| ResolveError::Unsupported(format!("URL mal formada: {query}")))?;
            if parsed.host_str().is_none() {
                return Err(ResolveError::Unsupported(format!("URL sin host: {query}")));
            }
            Ok(query.to_string())
        } else {
            Ok(format!("ytsearch1:{query}"))
        }
    }

    fn classify_failure(stderr: &str) -> ResolveError {
        let lower = stderr.to_lowercase();
        if lower.contains("unsupported url") {
            ResolveError::Unsupported(first_line(stderr))
        } else if lower.contains("not available")
            || lower.contains("video unavailable")
            || lower.contains("no video results")
            || lower.contains("does not exist")
        {
            ResolveError::NotFound
        } else {
            ResolveError::NetworkFailure(first_line(stderr))
        }
    }

    fn parse_metadata(line: &str) -> Result<YtDlpMetadata, ResolveError> {
        serde_json::from_str(line)
            .map_err(|e| ResolveError::NetworkFailure(format!("metadata ilegible de yt-dlp: {e}")))
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceResolver for YtDlpResolver {
    async fn resolve(
        &self,
        query: &str,
        requested_by: UserId,
    ) -> Result<TrackDescriptor, ResolveError> {
        let target = Self::target_for(query)?;
        debug!("🔍 Resolviendo con yt-dlp: {}", target);

        let mut command = Command::new("yt-dlp");
        command
            .args([
                "-j",
                "--no-playlist",
                "--skip-download",
                "--quiet",
                "--no-warnings",
            ])
            .arg(&target);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ResolveError::NetworkFailure("yt-dlp no respondió a tiempo".into()))?
            .map_err(|e| ResolveError::NetworkFailure(format!("no se pudo ejecutar yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp falló para {}: {}", target, first_line(&stderr));
            return Err(Self::classify_failure(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .find(|l| l.trim_start().starts_with('{'))
            .ok_or(ResolveError::NotFound)?;

        let meta = Self::parse_metadata(line)?;
        let locator = meta.webpage_url.unwrap_or_else(|| query.to_string());
        let duration = meta
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(Duration::from_secs_f64);

        info!("🎶 Resuelto: {} [{}]", meta.title, locator);

        Ok(TrackDescriptor::new(
            locator,
            meta.title,
            duration,
            requested_by,
        ))
    }
}

/// Campos que nos interesan del JSON por línea de `yt-dlp -j`
#[derive(Debug, Deserialize)]
struct YtDlpMetadata {
    title: String,
    webpage_url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or("").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_target_for_queries_and_urls() {
        assert_eq!(
            YtDlpResolver::target_for("daft punk around the world").unwrap(),
            "ytsearch1:daft punk around the world"
        );
        assert_eq!(
            YtDlpResolver::target_for("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert!(matches!(
            YtDlpResolver::target_for("http://"),
            Err(ResolveError::Unsupported(_))
        ));
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            YtDlpResolver::classify_failure("ERROR: Unsupported URL: ftp://x"),
            ResolveError::Unsupported(_)
        ));
        assert_eq!(
            YtDlpResolver::classify_failure("ERROR: Video unavailable"),
            ResolveError::NotFound
        );
        assert!(matches!(
            YtDlpResolver::classify_failure("ERROR: unable to download webpage"),
            ResolveError::NetworkFailure(_)
        ));
    }

    #[test]
    fn test_parse_metadata() {
        let line = r#"{"title":"Around the World","webpage_url":"https://www.youtube.com/watch?v=abc","duration":428.0,"extra":"ignored"}"#;
        let meta = YtDlpResolver::parse_metadata(line).unwrap();
        assert_eq!(meta.title, "Around the World");
        assert_eq!(
            meta.webpage_url.as_deref(),
            Some("https://www.youtube.com/watch?v=abc")
        );
        assert_eq!(meta.duration, Some(428.0));
    }

    #[test]
    fn test_parse_metadata_without_duration() {
        let line = r#"{"title":"Directo 24/7","webpage_url":"https://www.youtube.com/watch?v=live"}"#;
        let meta = YtDlpResolver::parse_metadata(line).unwrap();
        assert_eq!(meta.duration, None);
    }
}
