use cgns::array::ConversionError;
use cgns::{Config, DataType, Error, FileType, MemorySpace, RindConvention, Session, ZoneType};

use proptest::prelude::*;

/// a 5 x 4 x 3 vertex block whose `X` coordinate holds its own linear index
fn block(config: Config) -> (Session, usize, usize) {
    let mut session = Session::diskless(config).unwrap();
    let b = session.base_write("Base", 3, 3).unwrap();
    let z = session
        .zone_write(b, "Block", &[5, 4, 3, 4, 3, 2, 0, 0, 0], ZoneType::Structured)
        .unwrap();
    let x: Vec<f64> = (0..60).map(f64::from).collect();
    session.coord_write(b, z, "X", &x).unwrap();
    (session, b, z)
}

/// a 3 x 3 vertex square with one rind plane on every side
fn square_with_rind(config: Config) -> (Session, usize, usize) {
    let mut session = Session::diskless(config).unwrap();
    let b = session.base_write("Base", 2, 2).unwrap();
    let z = session
        .zone_write(b, "Square", &[3, 3, 2, 2, 0, 0], ZoneType::Structured)
        .unwrap();
    session.grid_write(b, z, "GridCoordinates").unwrap();
    session
        .goto(b, &[("Zone_t", z), ("GridCoordinates_t", 1)])
        .unwrap();
    session.rind_write(&[1, 1, 1, 1]).unwrap();
    (session, b, z)
}

#[test]
fn single_plane_of_a_block() {
    let (session, b, z) = block(Config::new());
    let mut plane = vec![0.0f64; 12];
    session
        .coord_read(b, z, "X", &[1, 1, 1], &[1, 4, 3], &mut plane)
        .unwrap();

    let expected: Vec<f64> = (0..3)
        .flat_map(|k| (0..4).map(move |j| f64::from(5 * j + 20 * k)))
        .collect();
    assert_eq!(plane, expected);
}

#[test]
fn plane_into_a_strided_memory_window() {
    let (session, b, z) = block(Config::new());
    // the second column of a [2, 4, 3] buffer
    let memory = MemorySpace::new(vec![2, 4, 3], vec![2, 1, 1], vec![2, 4, 3]);
    let mut out = vec![-1.0f64; 24];
    session
        .coord_general_read(b, z, "X", &[3, 1, 1], &[3, 4, 3], &memory, &mut out)
        .unwrap();

    for (n, value) in out.iter().enumerate() {
        let (i, j, k) = (n % 2, (n / 2) % 4, n / 8);
        if i == 0 {
            assert_eq!(*value, -1.0);
        } else {
            assert_eq!(*value, (2 + 5 * j + 20 * k) as f64);
        }
    }
}

#[test]
fn mismatched_counts_are_refused() {
    let (session, b, z) = block(Config::new());
    let mut out = vec![0.0f64; 11];
    let e = session
        .coord_read(b, z, "X", &[1, 1, 1], &[1, 4, 3], &mut out)
        .unwrap_err();
    assert!(matches!(e, Error::Invalid(_)));

    let mut out = vec![0.0f64; 12];
    assert!(session
        .coord_read(b, z, "X", &[0, 1, 1], &[0, 4, 3], &mut out)
        .is_err());
    assert!(session
        .coord_read(b, z, "X", &[2, 1, 1], &[1, 4, 3], &mut out)
        .is_err());
}

#[test]
fn core_rind_round_trip() {
    let (mut session, b, z) = square_with_rind(Config::new());
    let (rmin, rmax) = session.coord_default_range(b, z).unwrap();
    assert_eq!(rmin, vec![0, 0]);
    assert_eq!(rmax, vec![4, 4]);

    let x: Vec<f64> = (0..25).map(|n| f64::from(n) * 0.5).collect();
    session.coord_write(b, z, "X", &x).unwrap();

    let mut everything = vec![0.0f64; 25];
    session
        .coord_read(b, z, "X", &rmin, &rmax, &mut everything)
        .unwrap();
    assert_eq!(everything, x);

    // index 1 addresses the first core plane
    let mut core = vec![0.0f64; 9];
    session
        .coord_read(b, z, "X", &[1, 1], &[3, 3], &mut core)
        .unwrap();
    let expected: Vec<f64> = (1..=3)
        .flat_map(|j| (1..=3).map(move |i| f64::from(i + 5 * j) * 0.5))
        .collect();
    assert_eq!(core, expected);
}

#[test]
fn zero_convention_counts_from_the_first_stored_plane() {
    let config = Config::new().with_rind_convention(RindConvention::Zero);
    let (mut session, b, z) = square_with_rind(config);
    let (rmin, rmax) = session.coord_default_range(b, z).unwrap();
    assert_eq!(rmin, vec![1, 1]);
    assert_eq!(rmax, vec![5, 5]);

    let x: Vec<f64> = (0..25).map(f64::from).collect();
    session.coord_write(b, z, "X", &x).unwrap();
    let mut corner = vec![0.0f64; 1];
    session
        .coord_read(b, z, "X", &[1, 1], &[1, 1], &mut corner)
        .unwrap();
    assert_eq!(corner, vec![0.0]);
    assert!(session
        .coord_read(b, z, "X", &[0, 0], &[0, 0], &mut corner)
        .is_err());
}

#[test]
fn doubles_are_rounded_when_read_as_singles() {
    for file_type in [FileType::Ascii, FileType::Base64] {
        let (mut session, b, z) = block(Config::new().with_file_type(file_type));
        let y: Vec<f64> = (0..60).map(|n| f64::from(n) + 0.1).collect();
        session.coord_write(b, z, "Y", &y).unwrap();

        let mut singles = vec![0.0f32; 60];
        session
            .coord_read(b, z, "Y", &[1, 1, 1], &[5, 4, 3], &mut singles)
            .unwrap();
        let expected: Vec<f32> = y.iter().map(|v| *v as f32).collect();
        assert_eq!(singles, expected);
    }
}

#[test]
fn stored_type_is_chosen_by_the_writer() {
    let (mut session, b, z) = block(Config::new().with_file_type(FileType::Ascii));
    let z_values: Vec<f64> = (0..60).map(|n| f64::from(n) / 3.0).collect();
    session
        .coord_general_write(
            b,
            z,
            "Z",
            DataType::RealSingle,
            &[1, 1, 1],
            &[5, 4, 3],
            &MemorySpace::contiguous(60),
            &z_values,
        )
        .unwrap();

    let info = session.coord_info(b, z, 2).unwrap();
    assert_eq!(info.name, "Z");
    assert_eq!(info.data_type, DataType::RealSingle);

    let mut back = vec![0.0f64; 60];
    session
        .coord_read(b, z, "Z", &[1, 1, 1], &[5, 4, 3], &mut back)
        .unwrap();
    for (stored, given) in back.iter().zip(&z_values) {
        assert_eq!(*stored, f64::from(*given as f32));
    }
}

#[test]
fn characters_and_numbers_do_not_mix() {
    let (mut session, b, z) = block(Config::new());

    let mut out = vec![7u8; 60];
    let e = session
        .coord_read(b, z, "X", &[1, 1, 1], &[5, 4, 3], &mut out)
        .unwrap_err();
    assert!(matches!(e, Error::Conversion(ConversionError::Character { .. })));
    assert!(out.iter().all(|v| *v == 7));

    let e = session
        .coord_partial_write(b, z, "X", &[1, 1, 1], &[1, 1, 1], &[b'a'])
        .unwrap_err();
    assert!(matches!(e, Error::Conversion(_)));

    let mut x = vec![0.0f64; 60];
    session
        .coord_read(b, z, "X", &[1, 1, 1], &[5, 4, 3], &mut x)
        .unwrap();
    assert_eq!(x, (0..60).map(f64::from).collect::<Vec<_>>());
}

#[test]
fn partial_writes_only_touch_their_window() {
    let (mut session, b, z) = block(Config::new());
    session
        .coord_partial_write(b, z, "X", &[2, 2, 2], &[3, 2, 2], &[-1.0f64, -2.0])
        .unwrap();

    let mut x = vec![0.0f64; 60];
    session
        .coord_read(b, z, "X", &[1, 1, 1], &[5, 4, 3], &mut x)
        .unwrap();
    for (n, value) in x.iter().enumerate() {
        match n {
            26 => assert_eq!(*value, -1.0),
            27 => assert_eq!(*value, -2.0),
            _ => assert_eq!(*value, n as f64),
        }
    }
}

#[test]
fn failed_conversions_leave_no_array_behind() {
    for file_type in [FileType::Ascii, FileType::Base64] {
        let (mut session, b, z) = block(Config::new().with_file_type(file_type));
        let mut counts: Vec<i64> = (0..60).collect();
        counts[17] = i64::MAX;

        let write = |session: &mut Session, counts: &[i64]| {
            session.coord_general_write(
                b,
                z,
                "Count",
                DataType::Integer,
                &[1, 1, 1],
                &[5, 4, 3],
                &MemorySpace::contiguous(60),
                counts,
            )
        };
        assert!(write(&mut session, &counts).is_err());
        assert_eq!(session.ncoords(b, z).unwrap(), 1);

        // the name is free again, even in write mode
        counts[17] = 17;
        assert_eq!(write(&mut session, &counts).unwrap(), 2);
        let mut back = vec![0i32; 60];
        session
            .coord_read(b, z, "Count", &[1, 1, 1], &[5, 4, 3], &mut back)
            .unwrap();
        assert_eq!(back[17], 17);
    }
}

proptest! {
    #[test]
    fn integers_survive_a_double_array(
        values in proptest::collection::vec(-1_000_000i32..1_000_000, 60)
    ) {
        let (mut session, b, z) = block(Config::new().with_file_type(FileType::Ascii));
        session
            .coord_general_write(
                b,
                z,
                "Y",
                DataType::RealDouble,
                &[1, 1, 1],
                &[5, 4, 3],
                &MemorySpace::contiguous(60),
                &values,
            )
            .unwrap();

        let mut back = vec![0i32; 60];
        session
            .coord_read(b, z, "Y", &[1, 1, 1], &[5, 4, 3], &mut back)
            .unwrap();
        prop_assert_eq!(back, values);
    }

    #[test]
    fn any_window_reads_what_the_full_array_holds(
        lo in (1i64..=5, 1i64..=4, 1i64..=3),
        len in (0i64..5, 0i64..4, 0i64..3),
    ) {
        let (session, b, z) = block(Config::new());
        let hi = ((lo.0 + len.0).min(5), (lo.1 + len.1).min(4), (lo.2 + len.2).min(3));
        let count = ((hi.0 - lo.0 + 1) * (hi.1 - lo.1 + 1) * (hi.2 - lo.2 + 1)) as usize;

        let mut window = vec![0.0f64; count];
        session
            .coord_read(b, z, "X", &[lo.0, lo.1, lo.2], &[hi.0, hi.1, hi.2], &mut window)
            .unwrap();

        let mut n = 0;
        for k in lo.2..=hi.2 {
            for j in lo.1..=hi.1 {
                for i in lo.0..=hi.0 {
                    prop_assert_eq!(window[n], ((i - 1) + 5 * (j - 1) + 20 * (k - 1)) as f64);
                    n += 1;
                }
            }
        }
    }
}
