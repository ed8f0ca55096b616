use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;

use crate::error::{AppError, AppResult, ConfigError, FileError};
use crate::models::target::TargetDescriptor;

#[derive(Debug, Deserialize)]
struct TargetCatalog {
    #[serde(default)]
    targets: Vec<TargetDescriptor>,
}

/// 从 TOML 文件加载全部目标描述
pub async fn load_targets(path: &Path) -> AppResult<Vec<TargetDescriptor>> {
    if !path.exists() {
        return Err(AppError::File(FileError::NotFound {
            path: path.display().to_string(),
        }));
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;

    let targets = parse_targets(&content).map_err(|e| match e {
        AppError::File(FileError::TomlParseFailed { source, .. }) => {
            AppError::File(FileError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            })
        }
        other => other,
    })?;

    tracing::info!("成功加载 {} 个目标: {}", targets.len(), path.display());
    Ok(targets)
}

/// 解析并校验目标描述
pub fn parse_targets(content: &str) -> AppResult<Vec<TargetDescriptor>> {
    let catalog: TargetCatalog = toml::from_str(content)?;

    let mut seen = HashSet::new();
    for target in &catalog.targets {
        target.validate()?;
        if !seen.insert(target.id.as_str()) {
            return Err(ConfigError::DuplicateTarget {
                target_id: target.id.clone(),
            }
            .into());
        }
    }

    Ok(catalog.targets)
}

/// 按 ID 选出目标；`ids` 为空时返回全部
pub fn select_targets(
    targets: Vec<TargetDescriptor>,
    ids: &[String],
) -> AppResult<Vec<TargetDescriptor>> {
    if ids.is_empty() {
        return Ok(targets);
    }

    let known: HashSet<&str> = targets.iter().map(|t| t.id.as_str()).collect();
    if let Some(missing) = ids.iter().find(|id| !known.contains(id.as_str())) {
        return Err(AppError::invalid_target(missing, "alvo não encontrado no catálogo"));
    }

    Ok(targets
        .into_iter()
        .filter(|t| ids.iter().any(|id| id == &t.id))
        .collect())
}
