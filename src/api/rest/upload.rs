use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;

use crate::error::AppError;
use crate::models::courier::GeoPoint;

#[derive(Debug, Default)]
pub struct ImageUpload {
    pub image: Vec<u8>,
    pub content_type: String,
    pub note: Option<String>,
    pub location: Option<GeoPoint>,
}

fn bad_multipart(err: MultipartError) -> AppError {
    AppError::BadRequest(format!("malformed multipart body: {err}"))
}

fn parse_coordinate(field: &str, raw: &str) -> Result<f64, AppError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| AppError::BadRequest(format!("{field} must be a number")))
}

/// Reads an `image` part plus optional `note`, `lat` and `lng` text parts.
/// A missing image comes back empty so the engine can reject it.
pub async fn read_image_upload(mut multipart: Multipart) -> Result<ImageUpload, AppError> {
    let mut upload = ImageUpload {
        content_type: "application/octet-stream".to_string(),
        ..ImageUpload::default()
    };
    let mut lat = None;
    let mut lng = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                if let Some(content_type) = field.content_type() {
                    upload.content_type = content_type.to_string();
                }
                upload.image = field.bytes().await.map_err(bad_multipart)?.to_vec();
            }
            "note" => {
                let note = field.text().await.map_err(bad_multipart)?;
                upload.note = Some(note).filter(|n| !n.trim().is_empty());
            }
            "lat" => lat = Some(parse_coordinate("lat", &field.text().await.map_err(bad_multipart)?)?),
            "lng" => lng = Some(parse_coordinate("lng", &field.text().await.map_err(bad_multipart)?)?),
            _ => {}
        }
    }

    upload.location = match (lat, lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "lat and lng must be sent together".to_string(),
            ));
        }
    };
    Ok(upload)
}
