//! Manifest serialization round-trips: nothing is lost between the
//! structure the orchestrator builds and the JSON it persists.

use chrono::{TimeZone, Utc};
use remix_core::types::{
    AspectKey, CheckFlag, CheckResult, ContrastCheck, LegalCheck, PrecheckReport, ProhibitedMatch,
    Provenance, RunManifest, SkipReason, VariantManifest,
};

fn sample_checks() -> CheckResult {
    CheckResult {
        logo: CheckFlag::pass(),
        brand_colors: CheckFlag::pass(),
        contrast: ContrastCheck {
            ok: true,
            ratio: Some(4.27),
            detail: None,
        },
        safe_area: CheckFlag::pass(),
        legal: LegalCheck {
            prohibited_words: Vec::new(),
        },
    }
}

#[test]
fn successful_manifest_round_trips() {
    let manifest = RunManifest {
        campaign_id: "summer24".to_string(),
        locale: "es".to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap(),
        variants: vec![VariantManifest {
            product_id: "p1".to_string(),
            product_name: "Trail Shoe".to_string(),
            aspect: AspectKey::Landscape,
            path: "generated/summer24/es/p1/16x9/trail-shoe.png".to_string(),
            url: "https://cdn.example.com/generated/summer24/es/p1/16x9/trail-shoe.png"
                .to_string(),
            checks: sample_checks(),
            source: Provenance::Uploaded,
        }],
        precheck: None,
        skipped_generation: None,
        skip_reason: None,
    };

    let json = serde_json::to_string_pretty(&manifest).unwrap();
    let parsed: RunManifest = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, manifest);

    // Wire shape: camelCase fields, ratio preserved, no skip fields.
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["campaignId"], "summer24");
    assert_eq!(value["variants"][0]["productName"], "Trail Shoe");
    assert_eq!(value["variants"][0]["aspect"], "16x9");
    assert_eq!(value["variants"][0]["source"], "uploaded");
    assert_eq!(value["variants"][0]["checks"]["contrast"]["ratio"], 4.27);
    assert!(value.get("skippedGeneration").is_none());
}

#[test]
fn skipped_manifest_round_trips() {
    let manifest = RunManifest {
        campaign_id: "summer24".to_string(),
        locale: "en".to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap(),
        variants: Vec::new(),
        precheck: Some(PrecheckReport {
            legal: LegalCheck {
                prohibited_words: vec![ProhibitedMatch {
                    word: "damn".to_string(),
                    index: 2,
                }],
            },
        }),
        skipped_generation: Some(true),
        skip_reason: Some(SkipReason::ProhibitedWords),
    };

    let json = serde_json::to_string(&manifest).unwrap();
    let parsed: RunManifest = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, manifest);

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["skippedGeneration"], true);
    assert_eq!(value["skipReason"], "prohibited-words");
    assert_eq!(
        value["precheck"]["legal"]["prohibitedWords"][0]["word"],
        "damn"
    );
    assert_eq!(value["precheck"]["legal"]["prohibitedWords"][0]["index"], 2);
}

#[test]
fn provenance_tags_use_lowercase_wire_names() {
    assert_eq!(
        serde_json::to_string(&Provenance::Generated).unwrap(),
        "\"generated\""
    );
    assert_eq!(
        serde_json::from_str::<Provenance>("\"url\"").unwrap(),
        Provenance::Url
    );
}
