//! Flattening a decrypted document into environment-style pairs.
//!
//! Keys are joined with `_` and upper-cased, sequence items get their index
//! (`db.replicas[1].host` becomes `DB_REPLICAS_1_HOST`). When two paths map to
//! the same name the later value wins and keeps the first one's position.

use std::collections::HashMap;

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::plaintext::{PlainValue, PlaintextDocument};

pub fn flatten(doc: &PlaintextDocument) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    doc.root().walk_scalars(|path, value| {
        let name = path.env_name();
        let rendered = render(value);
        match positions.get(&name) {
            Some(&at) => pairs[at].1 = rendered,
            None => {
                positions.insert(name.clone(), pairs.len());
                pairs.push((name, rendered));
            }
        }
    });

    pairs
}

fn render(value: &PlainValue) -> String {
    match value {
        PlainValue::String(s) => s.clone(),
        PlainValue::Null => String::new(),
        PlainValue::Bytes(b) => STANDARD.encode(b),
        other => other.to_json().to_string(),
    }
}
