use crate::error::{AppError, AppResult, FileError};
use crate::models::unit::PageInput;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从文件夹中加载所有页面图片，按文件名中的页码排序
///
/// 支持 `doc-1.png`、`doc-02.png` 这类由 pdftoppm 生成的文件名；
/// 没有页码的文件排在最后，按文件名排序。
pub async fn load_page_images(folder_path: &str) -> AppResult<Vec<PageInput>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        return Err(FileError::DirectoryNotFound {
            path: folder_path.to_string(),
        }
        .into());
    }

    let mut image_files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?
    {
        let path = entry.path();
        if media_type_of(&path).is_some() {
            image_files.push(path);
        }
    }

    sort_by_page_number(&mut image_files);

    let mut pages = Vec::with_capacity(image_files.len());
    for (idx, path) in image_files.iter().enumerate() {
        let bytes = fs::read(path)
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        tracing::info!("正在加载第 {} 页: {}", idx + 1, file_name);

        pages.push(PageInput {
            page_number: idx + 1,
            file_name,
            media_type: media_type_of(path).unwrap_or("image/png").to_string(),
            bytes,
        });
    }

    Ok(pages)
}

fn media_type_of(path: &Path) -> Option<&'static str> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => Some("image/png"),
        Some("jpg") | Some("jpeg") => Some("image/jpeg"),
        Some("webp") => Some("image/webp"),
        _ => None,
    }
}

fn sort_by_page_number(files: &mut [PathBuf]) {
    let re = match Regex::new(r"(\d+)\.[A-Za-z]+$") {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!("⚠️ 页码正则无效，按文件名排序: {}", e);
            files.sort();
            return;
        }
    };
    let page_number = |path: &PathBuf| -> Option<u64> {
        let name = path.file_name()?.to_str()?;
        re.captures(name)?.get(1)?.as_str().parse().ok()
    };
    files.sort_by(|a, b| {
        let key_a = (page_number(a).unwrap_or(u64::MAX), a.file_name().map(|n| n.to_owned()));
        let key_b = (page_number(b).unwrap_or(u64::MAX), b.file_name().map(|n| n.to_owned()));
        key_a.cmp(&key_b)
    });
}
