//! Edge case tests for ecovision-eye

use ecovision_eye::codec::{decode_base64_image, decode_pixels, encode_base64, encode_data_url};
use ecovision_eye::mapper::{MatchKind, DEFAULT_DUSTBIN, GENERIC_DISPOSAL};
use ecovision_eye::{BoundingBox, Detection, VisionConfig, WasteCategory, WasteMapper};

#[test]
fn test_every_category_is_reachable_by_exact_key() {
    let mapper = WasteMapper::new();
    for category in WasteCategory::ALL {
        let m = mapper.resolve(category.as_str());
        assert_eq!(m.category, category);
        assert_eq!(m.kind, MatchKind::Exact);
    }
}

#[test]
fn test_every_rule_key_resolves_exactly_in_any_case() {
    let mapper = WasteMapper::new();
    for &(key, category) in mapper.rules() {
        for label in [key.to_string(), key.to_uppercase(), capitalize(key)] {
            let m = mapper.resolve(&label);
            assert_eq!(m.category, category, "label {}", label);
            assert_eq!(m.kind, MatchKind::Exact, "label {}", label);
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[test]
fn test_all_classes_in_table_order() {
    let mapper = WasteMapper::new();
    assert_eq!(
        mapper.all_classes(),
        vec![
            "plastic_bottle",
            "plastic_wrapper",
            "paper_cup",
            "food_waste",
            "glass_bottle",
            "metal_can",
            "cardboard_box",
            "cloth",
        ]
    );
}

#[test]
fn test_coco_labels_map_sensibly() {
    let mapper = WasteMapper::new();
    assert_eq!(mapper.map("bottle"), WasteCategory::PlasticBottle);
    assert_eq!(mapper.map("cup"), WasteCategory::PaperCup);
    assert_eq!(mapper.map("handbag"), WasteCategory::PlasticWrapper);
    assert_eq!(mapper.map("apple"), WasteCategory::FoodWaste);
    // unknown labels never fail
    assert_eq!(mapper.map("person"), WasteCategory::PlasticBottle);
    assert_eq!(mapper.resolve("person").kind, MatchKind::Default);
}

#[test]
fn test_ambiguous_label_takes_first_rule() {
    let mapper = WasteMapper::new();
    // contains "bottle" (rule 0) and "glass" (later)
    assert_eq!(mapper.map("glass bottle"), WasteCategory::PlasticBottle);
    // exact key beats any partial
    assert_eq!(mapper.map("glass_bottle"), WasteCategory::GlassBottle);
    // contains "bag" before "paper"
    assert_eq!(mapper.map("paper bag"), WasteCategory::PlasticWrapper);
}

#[test]
fn test_map_detection_copies_detection_fields() {
    let mapper = WasteMapper::new();
    let detection = Detection::new(BoundingBox::new(1.0, 2.0, 3.0, 4.0), 0.42, 7, "Aluminum");
    let mapped = mapper.map_detection(&detection);
    assert_eq!(mapped.class, WasteCategory::MetalCan);
    assert_eq!(mapped.confidence, 0.42);
    assert_eq!(mapped.class_id, 7);
    assert_eq!(mapped.bbox, detection.bbox);
    assert_eq!(mapped.disposal, WasteCategory::MetalCan.disposal());
}

#[test]
fn test_unknown_name_lookups() {
    let mapper = WasteMapper::new();
    assert_eq!(mapper.disposal_for(""), GENERIC_DISPOSAL);
    assert_eq!(mapper.dustbin_for("PLASTIC_BOTTLE"), DEFAULT_DUSTBIN);
    assert!(mapper.ideas_for("glass").is_empty());
}

#[test]
fn test_base64_round_trip_binary() {
    let bytes: Vec<u8> = (0..=255).collect();
    assert_eq!(decode_base64_image(&encode_base64(&bytes)).unwrap(), bytes);
    assert_eq!(
        decode_base64_image(&encode_data_url(&bytes, "webp")).unwrap(),
        bytes
    );
}

#[test]
fn test_data_url_with_only_prefix() {
    assert_eq!(decode_base64_image("data:image/png;base64,").unwrap(), Vec::<u8>::new());
}

#[test]
fn test_decode_pixels_truncated_png() {
    let img = image::RgbImage::new(16, 16);
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageOutputFormat::Png)
        .unwrap();
    let bytes = buf.into_inner();
    assert!(decode_pixels(&bytes).is_ok());
    assert!(decode_pixels(&bytes[..bytes.len() / 2]).unwrap_err().is_input_error());
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = VisionConfig::default();
    let text = toml::to_string(&config).unwrap();
    let parsed: VisionConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed.detector_models, config.detector_models);
    assert_eq!(parsed.segmenter_models, config.segmenter_models);
    assert_eq!(parsed.device, config.device);
}
