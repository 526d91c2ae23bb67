use vfs_mux::error::Error;
use vfs_mux::proto::{OpenMode, SeekWhence, WalkFlags};

use crate::common::{Client, Fixture};

#[tokio::test]
async fn close_invalidates_the_descriptor() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    let fd = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/a")
        .await
        .expect("create");
    client.close(fd).await.expect("close");

    assert_eq!(client.close(fd).await.unwrap_err(), Error::BadDescriptor);
    assert_eq!(client.read(fd, 1).await.unwrap_err(), Error::BadDescriptor);
    assert_eq!(
        client.seek(fd, 0, SeekWhence::Set).await.unwrap_err(),
        Error::BadDescriptor
    );

    // The slot is reusable afterwards.
    let again = client
        .walk(root, WalkFlags::empty(), "/a")
        .await
        .expect("walk into the freed slot");
    assert_eq!(again, fd);
}

#[tokio::test]
async fn dup_onto_itself_changes_nothing() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    let fd = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/a")
        .await
        .expect("create");
    assert_eq!(client.dup(fd, fd).await.expect("self dup"), fd);
    client.open(fd, OpenMode::READ).await.expect("still usable");
}

#[tokio::test]
async fn dup_shares_one_record() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    let fd = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/a")
        .await
        .expect("create");
    client.open(fd, OpenMode::WRITE).await.expect("open");

    let alias = client.dup(fd, 17).await.expect("dup");
    assert_eq!(alias, 17);

    // One shared position: a write through one descriptor moves the other.
    client.write(fd, b"abcd").await.expect("write");
    assert_eq!(client.seek(alias, 0, SeekWhence::Cur).await.unwrap(), 4);

    // Closing one name keeps the record alive under the other.
    client.close(fd).await.expect("close original");
    assert_eq!(client.seek(alias, 0, SeekWhence::Cur).await.unwrap(), 4);
}

#[tokio::test]
async fn dup_evicts_the_target_descriptor() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    let a = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/a")
        .await
        .expect("create a");
    let b = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/b")
        .await
        .expect("create b");

    client.dup(a, b).await.expect("dup over b");
    let stat_a = client.stat(a).await.expect("stat a");
    let stat_b = client.stat(b).await.expect("stat b");
    assert_eq!(stat_a, stat_b);
}

#[tokio::test]
async fn cloned_descriptors_have_independent_positions() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    let fd = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/a")
        .await
        .expect("create");
    client.open(fd, OpenMode::WRITE).await.expect("open");
    client.write(fd, b"0123456789").await.expect("write");

    let other = client.clone_fd(fd, false).await.expect("clone");
    // The clone needs its own open before data access.
    client.open(other, OpenMode::READ).await.expect("open clone");

    assert_eq!(client.seek(other, 0, SeekWhence::Cur).await.unwrap(), 0);
    assert_eq!(client.read(other, 4).await.expect("read clone"), b"0123");
    assert_eq!(client.seek(fd, 0, SeekWhence::Cur).await.unwrap(), 10);
}

#[tokio::test]
async fn clone_high_allocates_from_the_top() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    let high = client.clone_fd(root, true).await.expect("clone high");
    assert_eq!(high, 63);
}

#[tokio::test]
async fn handles_pass_between_sessions() {
    let fixture = Fixture::new().await;

    // Sessions number in the order they issue their first request: the
    // donor below is 1, the receiver 2.
    let mut donor = fixture.client().await;
    let root = fixture.mount_root(&mut donor).await;

    let fd = donor
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/gift")
        .await
        .expect("create");
    donor.open(fd, OpenMode::WRITE).await.expect("open");
    donor.write(fd, b"present").await.expect("write");

    let addr = fixture.addr;
    let waiter = tokio::spawn(async move {
        let mut receiver = Client::connect(addr).await;
        let got = receiver.wait_handle(false).await.expect("wait for donation");
        receiver.open(got, OpenMode::READ).await.expect("open donated");
        receiver.seek(got, 0, SeekWhence::Set).await.expect("rewind");
        receiver.read(got, 16).await.expect("read donated")
    });

    // Let the receiver park in WAIT_HANDLE before donating.
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    donor.pass_handle(fd, 2).await.expect("pass to session 2");
    assert_eq!(donor.close(fd).await.unwrap_err(), Error::BadDescriptor);

    assert_eq!(waiter.await.expect("join receiver"), b"present");
}

#[tokio::test]
async fn passing_to_an_unknown_session_restores_the_descriptor() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;

    let fd = client
        .walk(root, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/keep")
        .await
        .expect("create");
    assert_eq!(client.pass_handle(fd, 999).await.unwrap_err(), Error::NotFound);

    // The descriptor survived the failed donation.
    client.open(fd, OpenMode::READ).await.expect("still open");
}

#[tokio::test]
async fn concurrent_requests_on_one_session() {
    let fixture = Fixture::new().await;
    let mut client = fixture.client().await;
    let root = fixture.mount_root(&mut client).await;
    client.close(root).await.expect("close root fd");

    // A second connection issues requests while the first one has a
    // blocked WAIT_HANDLE outstanding: the dispatcher runs requests on
    // independent tasks, so the blocked call starves nobody.
    let addr = fixture.addr;
    let waiter = tokio::spawn(async move {
        let mut blocked = Client::connect(addr).await;
        blocked.wait_handle(false).await
    });

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    let fd = client
        .walk(vfs_mux::proto::FD_NONE, WalkFlags::MAY_CREATE | WalkFlags::REGULAR, "/w")
        .await
        .expect("walk while another session blocks");
    client.pass_handle(fd, 2).await.expect("unblock the waiter");

    let got = waiter.await.expect("join").expect("wait handle");
    assert_eq!(got, 0);
}
