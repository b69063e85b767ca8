use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use rand::{rngs::StdRng, Rng, SeedableRng};
use strided_span::{Array2D, FlatMemory, HeapBuffer, Memory2D, MemoryManager, ReadOnlyMemory2D};

#[test]
fn test_owning_slice_matches_borrowed_slice() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..100 {
        let height = rng.gen_range(1..10);
        let width = rng.gen_range(1..10);
        let array = Array2D::from_fn(height, width, |r, c| r * 100 + c);
        let row = rng.gen_range(0..height);
        let col = rng.gen_range(0..width);
        let h = rng.gen_range(1..=height - row);
        let w = rng.gen_range(1..=width - col);

        let borrowed = array.view().slice(row, col, h, w).unwrap().to_array();
        let owned = ReadOnlyMemory2D::from_array(array)
            .unwrap()
            .slice(row, col, h, w)
            .unwrap()
            .to_array();
        assert_eq!(borrowed, owned);
    }
}

#[test]
fn test_equality_laws() {
    let base = ReadOnlyMemory2D::from_vec((0..12).collect::<Vec<u16>>(), 3, 4).unwrap();
    let views = [
        base.clone(),
        base.slice(0, 0, 3, 4).unwrap(),
        base.slice(1, 1, 2, 2).unwrap(),
        base.slice(1, 1, 2, 2).unwrap(),
        ReadOnlyMemory2D::from_vec((0..12).collect::<Vec<u16>>(), 3, 4).unwrap(),
    ];
    for a in &views {
        assert_eq!(a, a);
        for b in &views {
            assert_eq!(a == b, b == a);
            if a == b {
                assert_eq!(a.hash_code(), b.hash_code());
            }
            for c in &views {
                if a == b && b == c {
                    assert_eq!(a, c);
                }
            }
        }
    }
    let distinct: HashSet<_> = views.iter().cloned().collect();
    assert_eq!(distinct.len(), 3);
}

#[test]
fn test_storage_outlives_the_source_scope() {
    let memory = {
        let cells: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        Memory2D::from_vec(cells, 2, 2).unwrap().into_read_only()
    };
    let column: Vec<&str> = memory.column(1).unwrap().iter().map(String::as_str).collect();
    assert_eq!(column, vec!["b", "d"]);
}

#[test]
fn test_disjoint_halves_written_from_threads() {
    let mut top = Memory2D::from_vec(vec![0u64; 8 * 6], 8, 6).unwrap();
    let bottom = top.split_at_row(4).unwrap();
    let workers: Vec<_> = [(top, 1u64), (bottom, 2u64)]
        .into_iter()
        .map(|(mut half, value)| {
            thread::spawn(move || {
                half.span_mut().fill(value);
                half
            })
        })
        .collect();
    let halves: Vec<Memory2D<u64>> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    assert!(halves[0].span().iter().all(|&x| x == 1));
    assert!(halves[1].span().iter().all(|&x| x == 2));
    assert_eq!(halves[0].len() + halves[1].len(), 48);
}

#[test]
fn test_manager_pins_are_balanced() {
    let buffer = Arc::new(HeapBuffer::from_vec(vec![1.5f32; 32]));
    let memory = ReadOnlyMemory2D::from_manager(buffer.clone(), 2, 5, 5, 1).unwrap();
    let handles: Vec<_> = (0..4).map(|_| memory.pin()).collect();
    assert_eq!(buffer.pin_count(), 4);
    drop(handles);
    assert_eq!(buffer.pin_count(), 0);
    assert_eq!(buffer.len(), 32);
}

#[test]
fn test_flat_round_trip() {
    let flat = FlatMemory::from_vec((0..20).collect::<Vec<i32>>());
    let mut memory = Memory2D::from_flat(flat, 0, 4, 5, 0).unwrap();
    memory.row_mut(2).unwrap().fill(-1);
    let flat = match memory.try_get_flat_memory() {
        Ok(flat) => flat,
        Err(_) => panic!("packed memory should be flat"),
    };
    assert_eq!(&flat.as_slice()[10..15], &[-1; 5]);
    assert_eq!(flat.len(), 20);
}
