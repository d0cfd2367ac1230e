use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array1;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use cgns::{Config, FileType, MemorySpace, Session, ZoneType};

/// a diskless session with one `n^3` vertex block holding random `X` coordinates
fn block(n: usize, file_type: FileType) -> Session {
    let mut session = Session::diskless(Config::new().with_file_type(file_type)).unwrap();
    let b = session.base_write("Base", 3, 3).unwrap();
    let z = session
        .zone_write(b, "Block", &[n, n, n, n - 1, n - 1, n - 1, 0, 0, 0], ZoneType::Structured)
        .unwrap();

    let x: Array1<f64> = Array1::random(n * n * n, Uniform::new(0., 10.));
    session.coord_write(b, z, "X", &x.into_raw_vec()).unwrap();
    session
}

fn full_range(session: &Session, n: i64, out: &mut [f64]) -> f64 {
    session
        .coord_read(1, 1, "X", &[1, 1, 1], &[n, n, n], out)
        .unwrap();
    out[0]
}

fn strided_plane(session: &Session, n: i64, out: &mut [f64]) -> f64 {
    let i = n / 2;
    session
        .coord_read(1, 1, "X", &[i, 1, 1], &[i, n, n], out)
        .unwrap();
    out[0]
}

/// the plane lands in the middle column of a `[3, n, n]` buffer
fn plane_into_window(session: &Session, n: i64, out: &mut [f64]) -> f64 {
    let memory = MemorySpace::new(vec![3, n as usize, n as usize], vec![2, 1, 1], vec![2, n, n]);
    session
        .coord_general_read(1, 1, "X", &[1, 1, 1], &[1, n, n], &memory, out)
        .unwrap();
    out[1]
}

fn staged_conversion(session: &Session, n: i64, out: &mut [f32]) -> f32 {
    session
        .coord_read(1, 1, "X", &[1, 1, 1], &[n, n, n], out)
        .unwrap();
    out[0]
}

fn general_read_bench(c: &mut Criterion) {
    for n in [32usize, 64] {
        let session = block(n, FileType::Base64);
        let ascii = block(n, FileType::Ascii);
        let len = n as i64;

        let mut all = vec![0.0f64; n * n * n];
        c.bench_function(&format!("full_range {n}"), |b| {
            b.iter(|| full_range(&session, black_box(len), &mut all))
        });

        let mut plane = vec![0.0f64; n * n];
        c.bench_function(&format!("strided_plane {n}"), |b| {
            b.iter(|| strided_plane(&session, black_box(len), &mut plane))
        });

        let mut window = vec![0.0f64; 3 * n * n];
        c.bench_function(&format!("plane_into_window {n}"), |b| {
            b.iter(|| plane_into_window(&session, black_box(len), &mut window))
        });

        let mut singles = vec![0.0f32; n * n * n];
        c.bench_function(&format!("staged_conversion {n}"), |b| {
            b.iter(|| staged_conversion(&ascii, black_box(len), &mut singles))
        });
    }
}

criterion_group!(benches, general_read_bench);
criterion_main!(benches);
