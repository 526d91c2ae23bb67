use vfs_mux::error::Error;
use vfs_mux::proto::{MountFlags, OpenMode, WalkFlags, FD_NONE};

use crate::common::Fixture;

#[tokio::test]
async fn rename_moves_a_file_between_directories() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::DIRECTORY, "/d1")
        .await
        .expect("create /d1");
    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::DIRECTORY, "/d2")
        .await
        .expect("create /d2");
    let x = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/d1/x")
        .await
        .expect("create /d1/x");
    client.open(x, OpenMode::WRITE).await.expect("open");
    client.write(x, b"payload").await.expect("write");
    client.close(x).await.expect("close");

    client.rename(root, "/d1/x", "/d2/y").await.expect("rename");

    assert_eq!(
        client.walk(root, WalkFlags::empty(), "/d1/x").await.unwrap_err(),
        Error::NotFound
    );
    let y = client.walk(root, WalkFlags::empty(), "/d2/y").await.expect("walk new name");
    client.open(y, OpenMode::READ).await.expect("open renamed");
    assert_eq!(client.read(y, 16).await.expect("read"), b"payload");
}

#[tokio::test]
async fn rename_replaces_and_destroys_the_orphan() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    let a = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/a")
        .await
        .expect("create /a");
    let b = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/b")
        .await
        .expect("create /b");
    client.close(a).await.expect("close a");
    client.close(b).await.expect("close b");

    client.rename(root, "/a", "/b").await.expect("rename over existing");

    // The replaced object had no holders, so exactly it was destroyed.
    assert_eq!(fixture.fs.destroyed().len(), 1);
    let remaining = client.walk(root, WalkFlags::empty(), "/b").await.expect("walk /b");
    client.open(remaining, OpenMode::READ).await.expect("open survivor");
}

#[tokio::test]
async fn failed_rename_restores_both_names() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::DIRECTORY, "/d")
        .await
        .expect("create /d");
    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/d/y")
        .await
        .expect("create /d/y");

    let err = client.rename(root, "/d/missing", "/d/y").await.unwrap_err();
    assert_eq!(err, Error::NotFound);

    // The unlinked destination was re-linked during rollback.
    client.walk(root, WalkFlags::empty(), "/d/y").await.expect("destination restored");
    assert!(fixture.fs.destroyed().is_empty());
}

#[tokio::test]
async fn rename_rejects_nested_paths() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::DIRECTORY, "/a")
        .await
        .expect("create /a");

    assert_eq!(client.rename(root, "/a", "/a/b").await.unwrap_err(), Error::Invalid);
    assert_eq!(client.rename(root, "/a/b", "/a").await.unwrap_err(), Error::Invalid);
    assert_eq!(client.rename(root, "/a", "/a").await.unwrap_err(), Error::Invalid);
}

#[tokio::test]
async fn unlink_of_unreferenced_object_destroys_it() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    let fd = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/a")
        .await
        .expect("create /a");
    client.close(fd).await.expect("drop the only descriptor");

    client.unlink(root, FD_NONE, WalkFlags::empty(), "/a").await.expect("unlink");

    assert_eq!(fixture.fs.destroyed().len(), 1);
    assert_eq!(
        client.walk(root, WalkFlags::empty(), "/a").await.unwrap_err(),
        Error::NotFound
    );
}

#[tokio::test]
async fn unlink_of_held_object_defers_destruction() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    let fd = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/a")
        .await
        .expect("create /a");
    client.open(fd, OpenMode::READ | OpenMode::WRITE).await.expect("open");

    client.unlink(root, FD_NONE, WalkFlags::empty(), "/a").await.expect("unlink");
    assert!(fixture.fs.destroyed().is_empty());

    // The open descriptor still reaches the unlinked object.
    assert_eq!(client.write(fd, b"still here").await.expect("write"), 10);
}

#[tokio::test]
async fn unlink_expected_descriptor_must_match() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    let a = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/a")
        .await
        .expect("create /a");
    let b = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/b")
        .await
        .expect("create /b");

    // Expecting the wrong node refuses the unlink.
    assert_eq!(
        client.unlink(root, b, WalkFlags::empty(), "/a").await.unwrap_err(),
        Error::NotFound
    );
    client.walk(root, WalkFlags::empty(), "/a").await.expect("/a survived");

    client.unlink(root, a, WalkFlags::empty(), "/a").await.expect("matching expectation");
    assert_eq!(
        client.walk(root, WalkFlags::empty(), "/a").await.unwrap_err(),
        Error::NotFound
    );
}

#[tokio::test]
async fn unlink_with_equal_descriptors_is_invalid() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    assert_eq!(
        client.unlink(root, root, WalkFlags::empty(), "/a").await.unwrap_err(),
        Error::Invalid
    );
}

#[tokio::test]
async fn unlink_directory_requires_empty() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::DIRECTORY, "/d")
        .await
        .expect("create /d");
    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/d/x")
        .await
        .expect("create /d/x");

    assert_eq!(
        client
            .unlink(root, FD_NONE, WalkFlags::DIRECTORY, "/d")
            .await
            .unwrap_err(),
        Error::NotEmpty
    );

    client.unlink(root, FD_NONE, WalkFlags::empty(), "/d/x").await.expect("empty it");
    client.unlink(root, FD_NONE, WalkFlags::DIRECTORY, "/d").await.expect("remove dir");
}

#[tokio::test]
async fn must_create_on_existing_name_reports_exists() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/a")
        .await
        .expect("create /a");
    assert_eq!(
        client
            .walk(root, WalkFlags::MUST_CREATE | WalkFlags::REGULAR, "/a")
            .await
            .unwrap_err(),
        Error::Exists
    );
}

#[tokio::test]
async fn repeated_lookup_is_stable() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/stable")
        .await
        .expect("create");

    let first = client.walk(root, WalkFlags::empty(), "/stable").await.expect("walk");
    let second = client.walk(root, WalkFlags::empty(), "/stable").await.expect("walk again");
    let stat_a = client.stat(first).await.expect("stat first");
    let stat_b = client.stat(second).await.expect("stat second");
    // Same triplet behind both descriptors.
    assert_eq!(stat_a, stat_b);
}

#[tokio::test]
async fn walk_flag_conflicts_are_invalid() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    for flags in [
        WalkFlags::MAY_CREATE | WalkFlags::MUST_CREATE | WalkFlags::REGULAR,
        WalkFlags::REGULAR | WalkFlags::DIRECTORY,
        WalkFlags::MAY_CREATE,
    ] {
        assert_eq!(client.walk(root, flags, "/x").await.unwrap_err(), Error::Invalid);
    }
}

#[tokio::test]
async fn kind_constraints_apply_to_existing_objects() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::DIRECTORY, "/dir")
        .await
        .expect("create dir");
    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/file")
        .await
        .expect("create file");

    assert_eq!(
        client.walk(root, WalkFlags::DIRECTORY, "/file").await.unwrap_err(),
        Error::NotDirectory
    );
    assert_eq!(
        client.walk(root, WalkFlags::REGULAR, "/dir").await.unwrap_err(),
        Error::IsDirectory
    );
    assert_eq!(
        client.walk(root, WalkFlags::empty(), "/file/sub").await.unwrap_err(),
        Error::NotDirectory
    );
}

#[tokio::test]
async fn dot_dot_walks_stay_inside_the_namespace() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::DIRECTORY, "/d")
        .await
        .expect("create /d");
    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/top")
        .await
        .expect("create /top");

    // "/d/../top" steps back over /d onto "/top".
    client.walk(root, WalkFlags::empty(), "/d/../top").await.expect("stepped-back walk");
    // ".." at the process root stays at the root.
    client.walk(root, WalkFlags::empty(), "/../top").await.expect("root ..");

    // A missing component fails even when ".." would step back over it.
    assert_eq!(
        client.walk(root, WalkFlags::empty(), "/missing/../top").await.unwrap_err(),
        Error::NotFound
    );

    // A parent reference is never a removable name.
    assert_eq!(
        client.unlink(root, FD_NONE, WalkFlags::empty(), "/d/..").await.unwrap_err(),
        Error::Invalid
    );
}

#[tokio::test]
async fn dot_dot_ascends_through_a_mount_point() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::DIRECTORY, "/d")
        .await
        .expect("create /d");
    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/d/sibling")
        .await
        .expect("create /d/sibling");
    let mp = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::DIRECTORY, "/d/m")
        .await
        .expect("create /d/m");
    client
        .mount(mp, 2, MountFlags::BLOCKING | MountFlags::NO_REF, 0, "", "tmpfs", "/d/m")
        .await
        .expect("mount at /d/m");

    // A walk whose base is the mounted root ascends back through the
    // mount point into the outer file system.
    let inner = client.walk(root, WalkFlags::empty(), "/d/m").await.expect("walk inner root");
    let up = client.walk(inner, WalkFlags::empty(), "/..").await.expect("ascend");
    client.walk(up, WalkFlags::empty(), "/sibling").await.expect("landed in /d");

    client
        .walk(inner, WalkFlags::empty(), "/../sibling")
        .await
        .expect("ascend and resolve in one walk");

    // The ascent lands at /d, not at the mount point's own name.
    let d = client.walk(root, WalkFlags::empty(), "/d").await.expect("walk /d");
    let stat_up = client.stat(up).await.expect("stat ascended");
    let stat_d = client.stat(d).await.expect("stat /d");
    assert_eq!(stat_up, stat_d);
}

#[tokio::test]
async fn rename_rejects_parent_components() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::DIRECTORY, "/d")
        .await
        .expect("create /d");
    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/d/x")
        .await
        .expect("create /d/x");

    assert_eq!(
        client.rename(root, "/d/../d/x", "/d/y").await.unwrap_err(),
        Error::Invalid
    );
    assert_eq!(client.rename(root, "/d/x", "/d/..").await.unwrap_err(), Error::Invalid);
}

#[tokio::test]
async fn unlink_sees_the_file_after_rename_rollback_chain() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::DIRECTORY, "/d")
        .await
        .expect("create /d");
    let fd = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/d/x")
        .await
        .expect("create /d/x");
    client.close(fd).await.expect("close");

    // Same-directory rename, exercising the shared-prefix base.
    client.rename(root, "/d/x", "/d/y").await.expect("rename in place");
    assert_eq!(
        client.walk(root, WalkFlags::empty(), "/d/x").await.unwrap_err(),
        Error::NotFound
    );
    client.unlink(root, FD_NONE, WalkFlags::empty(), "/d/y").await.expect("unlink new name");
    assert_eq!(fixture.fs.destroyed().len(), 1);
}
