//! Properties that must hold for every field, whatever the layout
//!
//! Layouts are enumerated deterministically over a spread of volumes, beam
//! angles, positions and heights.

use flux::{
    classify_voxels, compute_field, compute_field_with, idw_interpolate, metrics, BasicCosineModel,
    Category, CategoryFilter, FieldModel, LightSource, Resolution, RevealAnimator, SensorReading,
    Volume,
};

fn layouts() -> Vec<(Volume, Vec<LightSource>, Option<f32>)> {
    let volumes = [
        Volume::feet(2.0, 2.0, 4.0),
        Volume::feet(4.0, 8.0, 7.0),
        Volume::centimetres(120.0, 60.0, 150.0),
    ];
    let mut out = Vec::new();
    for volume in volumes {
        for (i, angle) in [0.0f32, 30.0, 90.0, 120.0, 180.0].into_iter().enumerate() {
            let x = i as f32 / 4.0;
            let lights = vec![
                LightSource::new("a", 750.0).with_beam_angle(angle).at(x, 1.0 - x),
                LightSource::new("b", 300.0)
                    .with_reference_height(1.0)
                    .with_quantity(3)
                    .at(0.5, 0.5)
                    .at(0.0, 0.0),
            ];
            for mount in [None, Some(0.5), Some(2.5)] {
                out.push((volume, lights.clone(), mount));
            }
        }
    }
    out
}

#[test]
fn test_field_is_non_negative() {
    for (volume, lights, mount) in layouts() {
        for model in [FieldModel::default(), FieldModel::Basic(BasicCosineModel)] {
            let field = compute_field_with(&model, &volume, &lights, Resolution::volume(7, 5, 3), mount);
            assert!(!field.is_empty());
            assert!(
                field.values().iter().all(|v| *v >= 0.0 && v.is_finite()),
                "negative or non-finite value for {volume:?} mount {mount:?}"
            );
        }
    }
}

#[test]
fn test_superposition() {
    for (volume, lights, mount) in layouts() {
        let res = Resolution::grid(6, 6);
        let both = compute_field(&volume, &lights, res, mount);
        let a = compute_field(&volume, &lights[..1], res, mount);
        let b = compute_field(&volume, &lights[1..], res, mount);
        for ((ab, a), b) in both.values().iter().zip(a.values()).zip(b.values()) {
            assert!((ab - (a + b)).abs() <= 1e-3 * ab.max(1.0));
        }
    }
}

#[test]
fn test_metrics_bounds() {
    for (volume, lights, mount) in layouts() {
        let field = compute_field(&volume, &lights, Resolution::grid(9, 9), mount);
        let m = metrics(&field);
        assert!(m.min <= m.average && m.average <= m.max, "{m:?}");
        if m.average > 0.0 {
            assert!((0.0..=1.0).contains(&m.uniformity));
        } else {
            assert_eq!(m.uniformity, 0.0);
        }
    }
}

#[test]
fn test_idw_exact_match() {
    let sensors: Vec<SensorReading> = (0..16)
        .map(|i| SensorReading::new((i % 4) as f32 * 0.7, (i / 4) as f32 * 1.3, 100.0 + i as f32 * 37.5))
        .collect();
    for s in &sensors {
        assert_eq!(idw_interpolate(&sensors, s.x, s.y), s.value);
    }
}

#[test]
fn test_idw_stays_within_reading_range() {
    let sensors = [
        SensorReading::new(0.0, 0.0, 120.0),
        SensorReading::new(3.0, 0.0, 480.0),
        SensorReading::new(0.0, 3.0, 260.0),
        SensorReading::new(3.0, 3.0, 700.0),
    ];
    for i in 0..=12 {
        for j in 0..=12 {
            let v = idw_interpolate(&sensors, i as f32 * 0.25, j as f32 * 0.25);
            assert!((120.0..=700.0).contains(&v), "{v}");
        }
    }
}

#[test]
fn test_reveal_monotonic() {
    for count in [0usize, 1, 14, 15, 16, 200, 1440, 5000] {
        let mut anim = RevealAnimator::new(count, 7);
        let mut last = 0;
        let dts = [0.0, 0.004, 0.016, 0.033, 0.1, 0.5];
        for step in 0..400 {
            let revealed = anim.tick(dts[step % dts.len()]);
            assert!(revealed >= last);
            assert!(revealed <= count);
            let eased = anim.eased_progress();
            assert!((0.0..=1.0).contains(&eased));
            assert_eq!(eased == 1.0, revealed == count, "count {count} revealed {revealed}");
            last = revealed;
        }
        assert!(anim.is_complete());
    }
}

#[test]
fn test_classification_is_total() {
    let mut v = -50.0f32;
    while v < 2000.0 {
        let c = Category::from_intensity(v);
        let matches = Category::ALL
            .iter()
            .filter(|cat| {
                let upper = Category::ALL
                    .get(cat.index() + 1)
                    .map(|next| next.lower_bound())
                    .unwrap_or(f32::INFINITY);
                (v >= cat.lower_bound() || **cat == Category::Low) && v < upper
            })
            .count();
        assert_eq!(matches, 1, "value {v} is in {matches} bands");
        assert!(Category::ALL.contains(&c));
        v += 12.5;
    }
    assert_eq!(Category::from_intensity(200.0), Category::Seedling);
}

#[test]
fn test_voxels_sorted_for_every_layout() {
    for (volume, lights, _) in layouts().into_iter().step_by(4) {
        let voxels = classify_voxels(&volume, &lights, Resolution::volume(5, 5, 4), &CategoryFilter::all());
        assert_eq!(voxels.len(), 100);
        assert!(voxels.windows(2).all(|w| w[0].intensity >= w[1].intensity));
        for v in &voxels {
            assert_eq!(v.category, Category::from_intensity(v.intensity));
        }
    }
}
