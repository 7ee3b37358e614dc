use syncable::{Record, RecordFields, SyncError, SyncableRecord};

#[derive(Clone, Debug, PartialEq, SyncableRecord)]
struct Address {
    city: String,
    zip: String,
}

#[derive(Clone, Debug, PartialEq, SyncableRecord)]
struct Profile {
    name: String,
    age: u32,
    #[syncable(nested)]
    address: Address,
}

fn profile() -> Profile {
    Profile {
        name: "Ann".into(),
        age: 30,
        address: Address {
            city: "Paris".into(),
            zip: "75000".into(),
        },
    }
}

#[test]
fn baseline_has_no_changes() {
    let r = Record::new(profile());
    assert!(!r.has_changes());
    assert!(r.peek_changeset().name.is_untouched());
}

#[test]
fn s1_single_field_edit_round_trips() {
    // spec.md S1: edit one field, changeset captures only that field.
    let mut r = Record::new(profile());
    r.get_mut().unwrap().age = 31;
    let cs = r.peek_changeset();
    assert_eq!(cs.age, syncable::Tracked::Value(30));
    assert!(cs.name.is_untouched());

    let committed = r.changeset();
    assert!(!r.has_changes());

    let redo = r.undo(&committed).unwrap();
    assert_eq!(r.get().age, 30);
    r.undo(&redo).unwrap();
    assert_eq!(r.get().age, 31);
}

#[test]
fn repeated_writes_only_capture_first_value() {
    let mut r = Record::new(profile());
    r.get_mut().unwrap().age = 31;
    r.get_mut().unwrap().age = 45;
    let cs = r.peek_changeset();
    assert_eq!(cs.age, syncable::Tracked::Value(30));
}

#[test]
fn zero_net_change_elides() {
    let mut r = Record::new(profile());
    r.get_mut().unwrap().age = 99;
    r.get_mut().unwrap().age = 30;
    assert!(!r.has_changes());
}

#[test]
fn s5_nested_record_field_tracks_independently() {
    let mut r = Record::new(profile());
    r.get_mut().unwrap().address.city = "Lyon".into();
    let cs = r.peek_changeset();
    assert!(cs.name.is_untouched());
    assert_eq!(cs.address.city, syncable::Tracked::Value("Paris".to_string()));
    assert!(cs.address.zip.is_untouched());

    let committed = r.changeset();
    r.undo(&committed).unwrap();
    assert_eq!(r.get().address.city, "Paris");
}

#[test]
fn undo_rejects_when_unsaved_changes_present() {
    let mut r = Record::new(profile());
    r.get_mut().unwrap().age = 5;
    let cs = r.peek_changeset();
    r.get_mut().unwrap().name = "Bea".into();
    assert_eq!(r.undo(&cs), Err(SyncError::HasChanges));
}

#[test]
fn immutable_record_rejects_mutation() {
    let mut r = Record::new(profile());
    r.make_immutable();
    assert_eq!(r.get_mut().err(), Some(SyncError::Immutable));
}

#[test]
fn merge_changesets_keeps_earliest_prior_per_field() {
    let mut r = Record::new(profile());
    r.get_mut().unwrap().age = 31;
    let c1 = r.changeset();
    r.get_mut().unwrap().age = 40;
    let c2 = r.changeset();

    let fused = r.merge_changesets(&[c1, c2]);
    assert_eq!(fused.age, syncable::Tracked::Value(30));
}

#[test]
fn cloud_merge_disjoint_fields_both_survive() {
    let base = profile();
    let mut local = Record::new(base.clone());
    local.get_mut().unwrap().age = 31;
    let pending = vec![local.changeset()];

    let mut remote_data = base.clone();
    remote_data.name = "Annie".into();
    let remote = Record::new(remote_data);

    local.merge_cloud_version(&remote, &pending).unwrap();
    assert_eq!(local.get().age, 31);
    assert_eq!(local.get().name, "Annie");
}

#[test]
fn cloud_merge_conflicting_field_local_wins() {
    let base = profile();
    let mut local = Record::new(base.clone());
    local.get_mut().unwrap().age = 31;
    let pending = vec![local.changeset()];

    let mut remote_data = base;
    remote_data.age = 99;
    let remote = Record::new(remote_data);

    local.merge_cloud_version(&remote, &pending).unwrap();
    assert_eq!(local.get().age, 31);
}
