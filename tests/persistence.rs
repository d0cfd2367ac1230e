use cgns::{
    BcType, Compaction, Config, DataBuffer, DataType, ElementType, Error, ErrorKind, FileType,
    GridLocation, MemoryStore, Mode, NodeStore, PointSetType, SectionState, Session, ZoneType,
};

use std::path::Path;

fn write_block(path: &Path, config: Config) {
    let mut session = Session::open(path, Mode::Write, config).unwrap();
    let b = session.base_write("Base", 3, 3).unwrap();
    let z = session
        .zone_write(b, "Block", &[3, 2, 2, 2, 1, 1, 0, 0, 0], ZoneType::Structured)
        .unwrap();

    let x: Vec<f64> = (0..12).map(|n| f64::from(n) * 0.25).collect();
    session.coord_write(b, z, "CoordinateX", &x).unwrap();
    let y: Vec<f32> = (0..12).map(|n| n as f32).collect();
    session.coord_write(b, z, "CoordinateY", &y).unwrap();

    let s = session
        .sol_write(b, z, "Cells", GridLocation::CellCenter)
        .unwrap();
    session
        .field_write(b, z, s, "Density", &[1.5f64, 2.5])
        .unwrap();
    session
        .boco_write(b, z, "Wall", BcType::BCWall, PointSetType::PointRange, &[1, 1, 1, 3, 2, 1])
        .unwrap();

    session.goto(b, &[("Zone_t", z)]).unwrap();
    session
        .descriptor_write("Origin", "written by a test")
        .unwrap();
    session.close().unwrap();
}

fn check_block(session: &Session) {
    assert_eq!(session.nbases(), 1);
    let base = session.base_read(1).unwrap();
    assert_eq!(base.name, "Base");
    assert_eq!((base.cell_dim, base.phys_dim), (3, 3));

    let zone = session.zone_read(1, 1).unwrap();
    assert_eq!(zone.name, "Block");
    assert_eq!(zone.size, vec![3, 2, 2, 2, 1, 1, 0, 0, 0]);

    let mut x = vec![0.0f64; 12];
    session
        .coord_read(1, 1, "CoordinateX", &[1, 1, 1], &[3, 2, 2], &mut x)
        .unwrap();
    assert_eq!(x, (0..12).map(|n| f64::from(n) * 0.25).collect::<Vec<_>>());

    let mut y = vec![0.0f32; 12];
    session
        .coord_read(1, 1, "CoordinateY", &[1, 1, 1], &[3, 2, 2], &mut y)
        .unwrap();
    assert_eq!(y[11], 11.0);

    let sol = session.sol_info(1, 1, 1).unwrap();
    assert_eq!(sol.name, "Cells");
    assert_eq!(sol.location, GridLocation::CellCenter);
    let mut density = vec![0.0f64; 2];
    session
        .field_read(1, 1, 1, "Density", &[1, 1, 1], &[2, 1, 1], &mut density)
        .unwrap();
    assert_eq!(density, vec![1.5, 2.5]);

    let wall = session.boco_info(1, 1, 1).unwrap();
    assert_eq!(wall.bc_type, BcType::BCWall);
    assert_eq!(session.boco_read(1, 1, 1).unwrap(), vec![1, 1, 1, 3, 2, 1]);
}

#[test]
fn documents_survive_a_round_trip() {
    for file_type in [FileType::Ascii, FileType::Base64] {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block.cgx");
        write_block(&path, Config::new().with_file_type(file_type));

        let mut session = Session::open(&path, Mode::Read, Config::new()).unwrap();
        assert_eq!(session.file_type(), file_type);
        check_block(&session);

        session.goto(1, &[("Zone_t", 1)]).unwrap();
        assert_eq!(
            session.descriptor_read(1).unwrap(),
            ("Origin".to_string(), "written by a test".to_string())
        );
        session.close().unwrap();
    }
}

#[test]
fn read_mode_refuses_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("block.cgx");
    write_block(&path, Config::new());

    let mut session = Session::open(&path, Mode::Read, Config::new()).unwrap();
    let e = session.base_write("Other", 2, 2).unwrap_err();
    assert!(matches!(e, Error::ReadOnly(_)));
    assert_eq!(e.kind(), ErrorKind::State);

    session.goto(1, &[("Zone_t", 1)]).unwrap();
    assert!(matches!(session.delete_node("Origin"), Err(Error::ReadOnly(_))));
    assert_eq!(session.nbases(), 1);
}

#[test]
fn missing_files_are_io_errors() {
    let dir = tempfile::tempdir().unwrap();
    let e = Session::open(dir.path().join("absent.cgx"), Mode::Read, Config::new()).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Io);
}

#[test]
fn modify_mode_keeps_and_extends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("block.cgx");
    write_block(&path, Config::new());

    let mut session = Session::open(&path, Mode::Modify, Config::new()).unwrap();
    check_block(&session);
    let z = session
        .zone_write(1, "Tail", &[4, 1, 0], ZoneType::Unstructured)
        .unwrap();
    session
        .section_write(1, z, "Bars", ElementType::Bar2, 1, 1, 0, &[1, 2])
        .unwrap();

    // a duplicate name replaces the old field
    session
        .field_write(1, 1, 1, "Density", &[9.0f64, 8.0])
        .unwrap();
    session.close().unwrap();

    let session = Session::open(&path, Mode::Read, Config::new()).unwrap();
    assert_eq!(session.nzones(1).unwrap(), 2);
    assert_eq!(session.elements_read(1, 2, 1).unwrap(), vec![1, 2]);
    assert_eq!(session.nfields(1, 1, 1).unwrap(), 1);
    let mut density = vec![0.0f64; 2];
    session
        .field_read(1, 1, 1, "Density", &[1, 1, 1], &[2, 1, 1], &mut density)
        .unwrap();
    assert_eq!(density, vec![9.0, 8.0]);
}

#[test]
fn replaced_entities_invalidate_the_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("block.cgx");
    write_block(&path, Config::new());

    let mut session = Session::open(&path, Mode::Modify, Config::new()).unwrap();
    session
        .goto(1, &[("Zone_t", 1), ("FlowSolution_t", 1)])
        .unwrap();
    assert_eq!(session.narrays().unwrap(), 1);

    session
        .sol_write(1, 1, "Cells", GridLocation::CellCenter)
        .unwrap();
    assert!(matches!(session.narrays(), Err(Error::InvalidHandle)));
    assert_eq!(session.nfields(1, 1, 1).unwrap(), 0);
}

#[test]
fn internal_links_resolve_after_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("block.cgx");
    write_block(&path, Config::new());

    let mut session = Session::open(&path, Mode::Modify, Config::new()).unwrap();
    let z = session
        .zone_write(1, "Twin", &[3, 2, 2, 2, 1, 1, 0, 0, 0], ZoneType::Structured)
        .unwrap();
    session.goto(1, &[("Zone_t", z)]).unwrap();
    session
        .link_write("GridCoordinates", "", "/Base/Block/GridCoordinates")
        .unwrap();
    assert!(session.link_write("Broken", "", "Base/Block").is_err());
    assert_eq!(session.ncoords(1, z).unwrap(), 2);
    session.close().unwrap();

    let mut session = Session::open(&path, Mode::Read, Config::new()).unwrap();
    let mut x = vec![0.0f64; 12];
    session
        .coord_read(1, 2, "CoordinateX", &[1, 1, 1], &[3, 2, 2], &mut x)
        .unwrap();
    assert_eq!(x[4], 1.0);

    session.goto(1, &[("Zone_t", 2)]).unwrap();
    assert!(session.is_link("GridCoordinates").unwrap());
    let link = session.link_read("GridCoordinates").unwrap();
    assert!(!link.is_external());
    assert_eq!(link.path, "/Base/Block/GridCoordinates");
}

/// sorted ids of every node reachable from the root
fn reachable(store: &MemoryStore) -> Vec<u64> {
    let mut ids = Vec::new();
    let mut pending = vec![store.root_id()];
    while let Some(id) = pending.pop() {
        ids.push(id.0);
        if store.link(id).unwrap().is_none() {
            pending.extend(store.children(id).unwrap());
        }
    }
    ids.sort_unstable();
    ids
}

/// removes nodes from the middle of the tree as well as the last ones allocated
fn prune_block(path: &Path, compaction: Compaction) {
    let config = Config::new().with_compaction(compaction);
    let mut session = Session::open(path, Mode::Modify, config).unwrap();
    session
        .goto(1, &[("Zone_t", 1), ("GridCoordinates_t", 1)])
        .unwrap();
    session.delete_node("CoordinateX").unwrap();
    session.goto(1, &[("Zone_t", 1)]).unwrap();
    session.delete_node("Origin").unwrap();
    session.goto(1, &[("Zone_t", 1), ("ZoneBC_t", 1)]).unwrap();
    session.delete_node("Wall").unwrap();
    session.close().unwrap();
}

#[test]
fn compaction_follows_the_policy() {
    let dense = |ids: &[u64]| ids.iter().enumerate().all(|(n, id)| *id == n as u64);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("block.cgx");

    write_block(&path, Config::new());
    prune_block(&path, Compaction::Never);
    assert!(!dense(&reachable(&MemoryStore::load(&path, false).unwrap())));

    write_block(&path, Config::new());
    prune_block(&path, Compaction::AfterDeletes(10));
    assert!(!dense(&reachable(&MemoryStore::load(&path, false).unwrap())));

    write_block(&path, Config::new());
    prune_block(&path, Compaction::AfterDeletes(2));
    assert!(dense(&reachable(&MemoryStore::load(&path, false).unwrap())));

    write_block(&path, Config::new());
    prune_block(&path, Compaction::Always);
    let session = Session::open(&path, Mode::Read, Config::new()).unwrap();
    assert_eq!(session.nbocos(1, 1).unwrap(), 0);
    assert_eq!(session.ncoords(1, 1).unwrap(), 1);
    let mut y = vec![0.0f32; 12];
    session
        .coord_read(1, 1, "CoordinateY", &[1, 1, 1], &[3, 2, 2], &mut y)
        .unwrap();
    assert_eq!(y[5], 5.0);
    assert_eq!(session.sol_info(1, 1, 1).unwrap().name, "Cells");
    assert!(dense(&reachable(&MemoryStore::load(&path, false).unwrap())));
}

#[test]
fn error_handler_sees_every_failure() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let config = Config::new().with_error_handler(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let mut session = Session::diskless(config).unwrap();
    assert!(session.base_write("Bad/Name", 3, 3).is_err());
    assert!(session.zone_read(1, 1).is_err());
    session.base_write("Base", 3, 3).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

fn mixed_surface(path: &Path) -> Session {
    let config = Config::new().with_file_type(FileType::Ascii);
    let mut session = Session::open(path, Mode::Write, config).unwrap();
    let b = session.base_write("Base", 3, 3).unwrap();
    session
        .zone_write(b, "Surface", &[8, 2, 0], ZoneType::Unstructured)
        .unwrap();
    session
}

#[test]
fn truncated_offsets_are_refused_after_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.cgx");
    let mut session = mixed_surface(&path);
    let connectivity = [5, 1, 2, 3, 7, 1, 2, 3, 4];
    session
        .poly_section_write(1, 1, "Mixed", ElementType::Mixed, 1, 2, 0, &connectivity, &[0, 4, 9])
        .unwrap();
    session.close().unwrap();

    // drop the last offset behind the session's back
    let mut store = MemoryStore::load(&path, true).unwrap();
    let mut node = store.root_id();
    for name in ["Base", "Surface", "Mixed", "ElementStartOffset"] {
        node = store.node_id(node, name).unwrap();
    }
    store
        .set_dimensions(node, DataType::LongInteger, &[2])
        .unwrap();
    store
        .write_all_data(node, &DataBuffer::LongInteger(vec![0, 4]))
        .unwrap();
    store.flush().unwrap();

    let session = Session::open(&path, Mode::Read, Config::new()).unwrap();
    assert!(matches!(session.poly_elements_partial_read(1, 1, 1, 2, 2), Err(Error::Invalid(_))));
    assert!(matches!(session.poly_elements_read(1, 1, 1), Err(Error::Invalid(_))));
    assert!(session.element_data_size(1, 1, 1).is_err());
}

#[test]
fn placeholder_sections_stay_initialized_after_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.cgx");
    let mut session = mixed_surface(&path);
    session
        .section_general_write(1, 1, "Mixed", ElementType::Mixed, 1, 2, 9, 0)
        .unwrap();
    session.section_initialize(1, 1, 1).unwrap();
    session.close().unwrap();

    let mut session = Session::open(&path, Mode::Modify, Config::new()).unwrap();
    assert_eq!(session.section_read(1, 1, 1).unwrap().state, SectionState::Initialized);
    session
        .poly_elements_partial_write(1, 1, 1, 2, 2, &[5, 1, 2, 3], &[0, 4])
        .unwrap();
    session.close().unwrap();

    let session = Session::open(&path, Mode::Read, Config::new()).unwrap();
    let info = session.section_read(1, 1, 1).unwrap();
    assert_eq!(info.state, SectionState::Populated);
    assert_eq!(session.poly_elements_read(1, 1, 1).unwrap().0, vec![2, 0, 5, 1, 2, 3]);
}
