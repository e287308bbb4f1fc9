/// QR code artifact generation
///
/// Each card carries a PNG QR code encoding its public URL. The artifact is
/// derived state: it is regenerated only when the target filename (derived
/// from the slug) no longer matches what is stored, which is also what stops
/// the save pipeline from re-entering itself. Generation failures are
/// non-fatal; a card must stay viewable and editable without its image.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Luma};
use qrcode::{EcLevel, QrCode};
use thiserror::Error;

/// Module pixel size used when rendering.
const MODULE_SIZE: u32 = 10;

/// Error type for QR artifact generation
#[derive(Debug, Error)]
pub enum QrError {
    /// Input data could not be encoded as a QR symbol
    #[error("Failed to encode QR data: {0}")]
    Encode(#[from] qrcode::types::QrError),

    /// PNG serialization failed
    #[error("Failed to write PNG: {0}")]
    Png(#[from] image::ImageError),
}

/// A freshly rendered artifact ready to attach to a card.
#[derive(Debug, Clone)]
pub struct QrArtifact {
    /// Deterministic filename derived from the slug.
    pub file_name: String,

    /// PNG image bytes.
    pub png: Vec<u8>,
}

/// Deterministic artifact filename for a slug.
pub fn target_file_name(slug: &str) -> String {
    format!("qr_code_{}.png", slug)
}

/// Builds the public URL a card's QR code encodes.
///
/// The `qr=1` marker lets the web layer distinguish scans from direct visits.
pub fn public_url(host: &str, slug: &str) -> String {
    format!("https://{}/card/{}/?qr=1", host, slug)
}

/// Returns a new artifact when the stored one is missing or stale.
///
/// `current_name` is the stored artifact filename, if any. When it already
/// equals the target filename for `slug`, the artifact still encodes the
/// right URL and `Ok(None)` is returned - the caller skips its second write.
pub fn ensure_qr(
    card_public_url: &str,
    slug: &str,
    current_name: Option<&str>,
) -> Result<Option<QrArtifact>, QrError> {
    let file_name = target_file_name(slug);
    if current_name == Some(file_name.as_str()) {
        return Ok(None);
    }

    let png = render_png(card_public_url)?;
    Ok(Some(QrArtifact { file_name, png }))
}

/// Renders `data` as a PNG QR image.
///
/// Error correction level L tolerates roughly 7% symbol damage; the renderer
/// keeps the standard quiet-zone border.
fn render_png(data: &str) -> Result<Vec<u8>, QrError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)?;
    let image = code
        .render::<Luma<u8>>()
        .module_dimensions(MODULE_SIZE, MODULE_SIZE)
        .quiet_zone(true)
        .build();

    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::L8,
    )?;

    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_file_name() {
        assert_eq!(target_file_name("test"), "qr_code_test.png");
        assert_eq!(target_file_name("test-2"), "qr_code_test-2.png");
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url("cards.example.com", "test"),
            "https://cards.example.com/card/test/?qr=1"
        );
    }

    #[test]
    fn test_ensure_qr_generates_when_missing() {
        let artifact = ensure_qr("https://cards.example.com/card/test/?qr=1", "test", None)
            .expect("encoding succeeds")
            .expect("artifact produced");

        assert_eq!(artifact.file_name, "qr_code_test.png");
        // PNG magic bytes.
        assert_eq!(&artifact.png[0..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_ensure_qr_skips_when_name_matches() {
        let result = ensure_qr(
            "https://cards.example.com/card/test/?qr=1",
            "test",
            Some("qr_code_test.png"),
        )
        .expect("no error");
        assert!(result.is_none(), "matching name must short-circuit");
    }

    #[test]
    fn test_ensure_qr_regenerates_on_slug_change() {
        let artifact = ensure_qr(
            "https://cards.example.com/card/test-2/?qr=1",
            "test-2",
            Some("qr_code_test.png"),
        )
        .expect("encoding succeeds")
        .expect("artifact produced");
        assert_eq!(artifact.file_name, "qr_code_test-2.png");
    }
}
