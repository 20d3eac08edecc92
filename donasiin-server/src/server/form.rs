use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

use super::AppError;
use crate::services::images::ImageUpload;

/// A fully buffered multipart form: text fields by name, files in arrival order.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: Vec<(String, ImageUpload)>,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::bad_request(e.body_text())
    }
}

pub async fn read_form(mut multipart: Multipart) -> Result<FormData, AppError> {
    let mut form = FormData::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?;
            // Browsers send an empty part for an untouched file input
            if bytes.is_empty() && file_name.as_deref().is_none_or(str::is_empty) {
                continue;
            }
            form.files.push((
                name,
                ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                },
            ));
        } else {
            let text = field.text().await.map_err(multipart_error)?;
            form.fields.insert(name, text);
        }
    }
    Ok(form)
}

impl FormData {
    pub fn optional(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn text(&self, name: &str) -> Result<String, AppError> {
        self.optional(name)
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request(format!("{name} is required")))
    }

    pub fn integer<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, AppError> {
        self.optional(name)
            .map(|v| {
                v.parse::<T>()
                    .map_err(|_| AppError::bad_request(format!("{name} must be a whole number")))
            })
            .transpose()
    }

    pub fn take_file(&mut self, name: &str) -> Option<ImageUpload> {
        let pos = self.files.iter().position(|(n, _)| n == name)?;
        Some(self.files.remove(pos).1)
    }

    pub fn take_files(&mut self, name: &str) -> Vec<ImageUpload> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(n, _)| n == name);
        self.files = rest;
        taken.into_iter().map(|(_, f)| f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> FormData {
        let mut f = FormData::default();
        f.fields.insert("amount".into(), " 25000 ".into());
        f.fields.insert("blank".into(), "  ".into());
        f.fields.insert("bad".into(), "12a".into());
        for (field, file) in [("images", "a.png"), ("receipt", "r.jpg"), ("images", "b.png")] {
            f.files.push((
                field.into(),
                ImageUpload {
                    file_name: Some(file.into()),
                    content_type: None,
                    bytes: vec![1],
                },
            ));
        }
        f
    }

    #[test]
    fn text_fields_are_trimmed_and_blank_means_missing() {
        let f = form();
        assert_eq!(f.optional("amount"), Some("25000"));
        assert_eq!(f.optional("blank"), None);
        assert!(matches!(f.text("blank"), Err(AppError::BadRequest(_))));
        assert_eq!(f.integer::<i64>("amount").unwrap(), Some(25000));
        assert_eq!(f.integer::<i64>("missing").unwrap(), None);
        assert!(f.integer::<i64>("bad").is_err());
    }

    #[test]
    fn files_are_taken_in_order() {
        let mut f = form();
        let images = f.take_files("images");
        let names: Vec<_> = images.iter().filter_map(|i| i.file_name.clone()).collect();
        assert_eq!(names, ["a.png", "b.png"]);
        assert!(f.take_file("receipt").is_some());
        assert!(f.take_file("receipt").is_none());
    }
}
