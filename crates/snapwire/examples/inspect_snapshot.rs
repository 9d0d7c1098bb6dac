//! Simple inspector for snapshot files captured from the wire.

use std::fs;

use serde_json::Value as Json;
use snapwire::{MetaTree, Snapshot};

fn format_data(data: &Json) -> String {
    let text = data.to_string();
    let preview: String = text.chars().take(80).collect();
    if text.chars().count() > 80 {
        format!("{}...", preview)
    } else {
        preview
    }
}

fn print_meta(name: &str, node: &MetaTree, depth: usize) {
    let indent = "  ".repeat(depth);
    let synth = node.synth.as_deref().unwrap_or("-");
    if node.meta.is_empty() {
        println!("{}{} [{}]", indent, name, synth);
    } else {
        println!("{}{} [{}] {}", indent, name, synth, Json::Object(node.meta.clone()));
    }
    for (segment, child) in &node.children {
        print_meta(segment, child, depth + 1);
    }
}

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "snapshot.json".to_string());
    let key = std::env::args().nth(2);

    println!("Reading: {}", path);

    let text = fs::read_to_string(&path).expect("Failed to read file");
    println!("File size: {} bytes", text.len());

    let snapshot = Snapshot::from_json_str(&text).expect("Failed to decode");

    println!("\n=== Fingerprint ===");
    println!("ID: {}", snapshot.fingerprint.id);
    println!("Component: {}", snapshot.fingerprint.name);
    println!("Checksum: {}", snapshot.checksum);
    if let Some(key) = key {
        match snapshot.verify(key.as_bytes()) {
            Ok(()) => println!("Checksum verified"),
            Err(e) => println!("Checksum NOT verified: {}", e),
        }
    }

    let properties = snapshot.data.as_object().map_or(0, |o| o.len());
    println!("\n=== Properties ({}) ===", properties);
    if let Some(object) = snapshot.data.as_object() {
        for (name, data) in object {
            let synth = snapshot
                .meta
                .child(name)
                .and_then(|m| m.synth.as_deref())
                .unwrap_or("plain");
            println!("  {} ({}) = {}", name, synth, format_data(data));
        }
    }

    println!("\n=== Meta Tree ===");
    for (name, node) in &snapshot.meta.children {
        print_meta(name, node, 1);
    }
}
