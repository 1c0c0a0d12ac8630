//! Randomized mutation runs.
//!
//! Each run applies a long, seeded series of mixed mutations to a bounded
//! sequence tree on a jittered store. After every call the child paths must
//! match their positions; after draining, the store must hold exactly the
//! local contents.

use mirrordoc::{Item, MirrorSeq, Slice};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::json;

use crate::helpers::*;

const CAPACITY: usize = 12;

fn first_child_seq(arr: &MirrorSeq) -> Option<MirrorSeq> {
    arr.to_vec().into_iter().find_map(|item| match item {
        Item::Seq(seq) => Some(seq),
        _ => None,
    })
}

fn first_child_map(arr: &MirrorSeq) -> Option<mirrordoc::MirrorMap> {
    arr.to_vec().into_iter().find_map(|item| match item {
        Item::Map(map) => Some(map),
        _ => None,
    })
}

fn step(arr: &MirrorSeq, rng: &mut StdRng) {
    let len = arr.len();
    let n: i64 = rng.gen_range(0..100);
    match rng.gen_range(0..15) {
        0 => arr.append(n).unwrap(),
        1 => arr.append_left(n).unwrap(),
        2 => arr.append(json!([n, n + 1])).unwrap(),
        3 => arr.extend_left([json!({"k": n}), json!(n)]).unwrap(),
        4 if len > 0 => {
            arr.pop().unwrap();
        }
        5 if len > 0 => {
            arr.pop_left().unwrap();
        }
        6 if len < CAPACITY => {
            let index = rng.gen_range(-3..=len as isize + 2);
            arr.insert(index, json!([n])).unwrap();
        }
        7 => arr.reverse().unwrap(),
        8 => arr.rotate(rng.gen_range(-3..=3)).unwrap(),
        9 if len > 0 => arr.set_item(rng.gen_range(0..len) as isize, n).unwrap(),
        10 if len > 0 => arr.del_item(-(rng.gen_range(1..=len) as isize)).unwrap(),
        11 => {
            let start = rng.gen_range(0..=len);
            let stop = rng.gen_range(0..=len);
            let replaced = stop.saturating_sub(start);
            let room = CAPACITY - (len - replaced);
            let given = rng.gen_range(0..=3).min(room);
            let values: Vec<_> = (0..given as i64).map(|i| json!([n + i])).collect();
            arr.assign_slice(Slice::new(start as isize, stop as isize), values)
                .unwrap();
        }
        12 => {
            if let Some(nested) = first_child_seq(arr) {
                if nested.is_empty() || rng.gen_bool(0.6) {
                    nested.append(n).unwrap();
                } else {
                    nested.pop_left().unwrap();
                }
            }
        }
        13 => {
            if let Some(map) = first_child_map(arr) {
                if rng.gen_bool(0.7) {
                    map.set(format!("f{}", n % 4), json!([n])).unwrap();
                } else if let Some(key) = map.keys().first() {
                    map.pop(key).unwrap();
                }
            }
        }
        14 if len > 0 => {
            let value = arr.get_value(rng.gen_range(0..len) as isize).unwrap();
            arr.remove(&value).unwrap();
        }
        _ => {}
    }
}

async fn run(seed: u64, steps: usize) {
    let store = jittered_store();
    let arr = open_seq(
        store.clone(),
        &doc(&format!("random-{seed}")),
        "tree.items",
        json!([]),
        Some(CAPACITY),
    )
    .await;
    let mut rng = StdRng::seed_from_u64(seed);

    for i in 0..steps {
        step(&arr, &mut rng);
        assert_seq_paths(&arr);
        assert!(arr.len() <= CAPACITY);
        if i % 50 == 49 {
            assert_seq_converged(&arr, store.as_ref()).await;
        }
    }
    assert_seq_converged(&arr, store.as_ref()).await;
}

#[tokio::test]
async fn test_random_mutations_converge() {
    for seed in 0..4 {
        run(seed, 150).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_random_mutations_converge_multi_thread() {
    run(42, 200).await;
}
