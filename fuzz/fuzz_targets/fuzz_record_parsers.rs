#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pixcal_core::mocks::{StaticConfig, UniformLayout};
use pixcal_core::{DiodeType, Ingestor, ParseContext, RawRecord, RecordSet, parse_record};
use pixcal_traits::ReadoutTechnology;

#[derive(Debug, Arbitrary)]
struct Input {
    text: String,
    front_ends: u8,
    fei4: bool,
    dbm: bool,
    extrapolate: bool,
}

fuzz_target!(|input: Input| {
    let technology = if input.fei4 {
        ReadoutTechnology::Fei4
    } else {
        ReadoutTechnology::Fei3
    };
    let mut layout = UniformLayout::new(4, usize::from(input.front_ends % 17), technology);
    if input.dbm {
        layout = layout.with_dbm(1);
    }
    let config = StaticConfig {
        linear_extrapolation: input.extrapolate,
        ..StaticConfig::default()
    };
    let ctx = ParseContext::new(&layout, &config);

    // Text encoding: any accepted bundle must be internally consistent
    if let Ok(bundle) = parse_record(ctx, 1, &RawRecord::Text(input.text.clone())) {
        assert!(bundle.is_valid && bundle.is_consistent());
    }

    // JSON encodings through the full ingestion pass
    if let Ok(set) = RecordSet::from_json(&input.text) {
        let Ok((store, report)) = Ingestor::new(&layout, &config).run(Some(&set)) else {
            return;
        };
        assert!(report.populated <= store.module_count());
        for module in 0..store.module_count() {
            if store.is_populated(module) {
                let _ = store.tot(DiodeType::Normal, module, 0, 10_000.0);
                let _ = store.charge(DiodeType::Large, module, 0, 5.0);
            }
        }
    }
});
