use std::io::Cursor;

use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};

pub fn png(width: u32, height: u32, color: [u8; 4]) -> Bytes {
    let image = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    Bytes::from(buffer.into_inner())
}

pub fn geometry() -> Bytes {
    Bytes::from_static(b"MOC3\x03\x00\x00\x00geometry")
}

pub fn motion(duration: f32) -> Bytes {
    Bytes::from(format!(
        r#"{{
            "Version": 3,
            "Meta": {{"Duration": {}, "Fps": 30.0, "Loop": true, "FadeInTime": 0.75}},
            "Curves": [
                {{"Target": "Parameter", "Id": "ParamAngleX", "Segments": [0, 0, 0, 1, 30]}},
                {{"Target": "PartOpacity", "Id": "PartArmA", "Segments": [0, 1]}}
            ]
        }}"#,
        duration
    ))
}

pub fn expression(value: f32) -> Bytes {
    Bytes::from(format!(
        r#"{{
            "Type": "Live2D Expression",
            "FadeInTime": 0.3,
            "Parameters": [
                {{"Id": "ParamEyeLSmile", "Value": {}, "Blend": "Add"}},
                {{"Id": "ParamMouthForm", "Value": 0.5, "Blend": "Multiply"}}
            ]
        }}"#,
        value
    ))
}

pub fn user_data() -> Bytes {
    Bytes::from_static(
        br#"{"Version": 3, "UserData": [{"Target": "ArtMesh", "Id": "ArtMesh1", "Value": "ribbon"}]}"#,
    )
}

pub fn json_object() -> Bytes {
    Bytes::from_static(br#"{"Version": 3}"#)
}
