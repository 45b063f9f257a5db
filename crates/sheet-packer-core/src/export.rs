use serde_json::{Value, json};

use crate::compositing::SheetOutcome;
use crate::model::PlacementRecord;

/// Manifest of a run: one entry per sheet, placements keyed by source key.
/// Shape: `{ sheets: [ { group, path, width, height, format, stats } ], images: { key: { id, group, sheet, x, y, w, h, margin } } }`.
pub fn to_json(sheets: &[SheetOutcome]) -> Value {
    let sheets_val: Vec<Value> = sheets
        .iter()
        .map(|s| {
            json!({
                "group": s.record.group_key,
                "path": s.record.relative_path,
                "width": s.record.width,
                "height": s.record.height,
                "format": s.record.format,
                "stats": s.stats,
            })
        })
        .collect();
    json!({
        "sheets": sheets_val,
        "images": placements_to_json(sheets.iter().flat_map(|s| s.placements.iter())),
    })
}

/// Placement records keyed by source key. Used on its own for layout-only runs.
pub fn placements_to_json<'a>(records: impl IntoIterator<Item = &'a PlacementRecord>) -> Value {
    let mut images = serde_json::Map::new();
    for r in records {
        let m = r.margin;
        images.insert(
            r.key.clone(),
            json!({
                "id": r.id,
                "group": r.group_key,
                "sheet": r.sheet,
                "x": r.x,
                "y": r.y,
                "w": r.width,
                "h": r.height,
                "margin": {"top": m.top, "right": m.right, "bottom": m.bottom, "left": m.left},
            }),
        );
    }
    Value::Object(images)
}
