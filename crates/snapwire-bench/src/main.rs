//! Benchmark for snapshot round trips over a large record graph.
//!
//! Builds authors with posts and comments in a [`MemoryStore`], mounts them
//! on a component and times dehydration, wire encoding, hydration and a
//! batch of client updates.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use snapwire::model::builder::RecordBuilder;
use snapwire::store::RecordLoader;
use snapwire::{Blueprint, Codec, CodecOptions, MemoryStore, RecordCollection, Scalar, Snapshot};

// =============================================================================
// DATASET
// =============================================================================

const POSTS_PER_AUTHOR: i64 = 10;
const COMMENTS_PER_POST: i64 = 5;

fn build_store(authors: i64) -> MemoryStore {
    let store = MemoryStore::new("main")
        .has_many("Author", "posts", "Post", "author_id")
        .has_many("Post", "comments", "Comment", "post_id");

    let mut post_id = 0;
    let mut comment_id = 0;
    for author in 1..=authors {
        store
            .insert(
                RecordBuilder::new("Author")
                    .key(author)
                    .attr("name", format!("Author {author}"))
                    .attr("email", format!("author{author}@example.com"))
                    .build(),
            )
            .expect("Failed to insert author");
        for _ in 0..POSTS_PER_AUTHOR {
            post_id += 1;
            store
                .insert(
                    RecordBuilder::new("Post")
                        .key(post_id)
                        .attr("title", format!("Post {post_id}"))
                        .attr("body", "Lorem ipsum dolor sit amet ".repeat(8))
                        .attr("author_id", author)
                        .build(),
                )
                .expect("Failed to insert post");
            for _ in 0..COMMENTS_PER_POST {
                comment_id += 1;
                store
                    .insert(
                        RecordBuilder::new("Comment")
                            .key(comment_id)
                            .attr("comment", format!("Comment {comment_id}"))
                            .attr("post_id", post_id)
                            .build(),
                    )
                    .expect("Failed to insert comment");
            }
        }
    }
    store
}

fn main() {
    let authors: i64 = std::env::args()
        .nth(1)
        .and_then(|n| n.parse().ok())
        .unwrap_or(200);

    let build_start = Instant::now();
    let store = Arc::new(build_store(authors));
    println!(
        "Built {} authors, {} posts, {} comments in {:?}",
        authors,
        authors * POSTS_PER_AUTHOR,
        authors * POSTS_PER_AUTHOR * COMMENTS_PER_POST,
        build_start.elapsed()
    );

    let keys: Vec<Scalar> = (1..=authors).map(Scalar::Int).collect();
    let relations = ["posts".to_string(), "posts.comments".to_string()];
    let load_start = Instant::now();
    let loaded = store
        .load_by_keys("Author", &keys, None, &relations)
        .expect("Failed to load authors");
    println!("Eager-loaded graph in {:?}", load_start.elapsed());

    let codec = Codec::new(store.clone())
        .with_options(CodecOptions::new().checksum_key("bench-secret"));
    let blueprint = Arc::new(
        Blueprint::new("author-index")
            .rule("authors.*.name", "required")
            .rule("authors.*.posts.*.title", "required")
            .rule("authors.*.posts.*.comments.*.comment", "required"),
    );
    let mut state = blueprint.instantiate();
    state.set("authors", RecordCollection::from_records("Author", loaded));

    // Dehydrate
    let dehydrate_start = Instant::now();
    let snapshot = codec.dehydrate(&mut state).expect("Failed to dehydrate");
    let dehydrate_time = dehydrate_start.elapsed();

    let encode_start = Instant::now();
    let wire = snapshot.to_json_string().expect("Failed to encode");
    let encode_time = encode_start.elapsed();

    println!("\nDehydrate: {:?}", dehydrate_time);
    println!(
        "Encode: {} bytes in {:?} ({:.2} MB/s)",
        wire.len(),
        encode_time,
        (wire.len() as f64 / 1_000_000.0) / encode_time.as_secs_f64()
    );

    // Hydrate
    let decode_start = Instant::now();
    let received = Snapshot::from_json_str(&wire).expect("Failed to decode");
    let decode_time = decode_start.elapsed();

    store.reset_load_count();
    let hydrate_start = Instant::now();
    let mut restored = codec.hydrate(&received, &blueprint).expect("Failed to hydrate");
    let hydrate_time = hydrate_start.elapsed();

    println!("\nDecode: {:?}", decode_time);
    println!(
        "Hydrate: {:?} ({} store loads)",
        hydrate_time,
        store.load_count()
    );

    // Updates
    let updates: Vec<(String, serde_json::Value)> = (0..authors)
        .map(|i| (format!("authors.{i}.posts.0.title"), json!(format!("Edited {i}"))))
        .collect();
    let update_start = Instant::now();
    codec
        .apply_updates(&mut restored, updates)
        .expect("Failed to apply updates");
    println!("\nApplied {} updates in {:?}", authors, update_start.elapsed());

    let redehydrate_start = Instant::now();
    let next = codec.dehydrate(&mut restored).expect("Failed to dehydrate");
    println!("Re-dehydrate: {:?}", redehydrate_start.elapsed());
    assert_ne!(next.checksum, snapshot.checksum);
}
