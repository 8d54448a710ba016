//! QR code rendering for pairing: PNG data URLs for observers and a compact
//! terminal rendering for the log.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use wabridge_core::error::BridgeError;

/// Render a QR code using Unicode half-block characters.
///
/// Packs two rows of modules into one line of text using `▀`, `▄`, `█`, and space.
pub fn generate_qr_terminal(qr_data: &str) -> Result<String, BridgeError> {
    use qrcode::{Color, EcLevel, QrCode};

    let code = QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::L)
        .map_err(|e| BridgeError::Session(format!("QR generation failed: {e}")))?;

    let width = code.width();
    let colors: Vec<Color> = code.into_colors();
    let is_dark = |row: usize, col: usize| row < width && colors[row * width + col] == Color::Dark;

    let mut out = String::new();
    for row in (0..width).step_by(2) {
        for col in 0..width {
            out.push(match (is_dark(row, col), is_dark(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }

    Ok(out)
}

/// Render a QR code as PNG bytes with a white quiet zone.
pub fn generate_qr_image(qr_data: &str) -> Result<Vec<u8>, BridgeError> {
    use image::{ImageBuffer, Luma};
    use qrcode::{Color, EcLevel, QrCode};

    let code = QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::M)
        .map_err(|e| BridgeError::Session(format!("QR generation failed: {e}")))?;

    const MODULE_SIZE: u32 = 8;
    const QUIET_ZONE: u32 = 4;
    let modules = code.width() as u32;
    let img_size = (modules + QUIET_ZONE * 2) * MODULE_SIZE;

    let img = ImageBuffer::from_fn(img_size, img_size, |x, y| {
        let (cx, cy) = (x / MODULE_SIZE, y / MODULE_SIZE);
        let inside = (QUIET_ZONE..QUIET_ZONE + modules).contains(&cx)
            && (QUIET_ZONE..QUIET_ZONE + modules).contains(&cy);
        if !inside {
            return Luma([255u8]);
        }
        match code[((cx - QUIET_ZONE) as usize, (cy - QUIET_ZONE) as usize)] {
            Color::Dark => Luma([0u8]),
            Color::Light => Luma([255u8]),
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| BridgeError::Session(format!("PNG encoding failed: {e}")))?;

    Ok(buf.into_inner())
}

/// Encode a QR payload as a `data:image/png;base64,...` URL for browsers.
pub fn qr_data_url(qr_data: &str) -> Result<String, BridgeError> {
    let png = generate_qr_image(qr_data)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(png)))
}
