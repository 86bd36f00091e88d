//! End-to-end distribution tests over the in-process bus.
//!
//! Run with: cargo test --test distribution
//!
//! Service write -> distributor -> per-user topic -> streamer.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use todo_sv::bus::{ChannelEventBus, EventBus};
use todo_sv::distributor::{DistributorState, UserEventsDistributor};
use todo_sv::events::{EventType, SubjectScheme};
use todo_sv::model::{NewTask, Project, ProjectUpdate};
use todo_sv::service::ProjectService;
use todo_sv::storage::MemoryProjectStore;
use todo_sv::streamer::SubscriptionStreamer;

const DISTRIBUTOR_GROUP: &str = "user-worker-group";

struct Stack {
    bus: ChannelEventBus,
    service: ProjectService,
    streamer: Arc<SubscriptionStreamer>,
    distributor: Arc<UserEventsDistributor>,
    cancel: CancellationToken,
    distributor_handle: tokio::task::JoinHandle<()>,
}

impl Stack {
    async fn start() -> Self {
        let bus = ChannelEventBus::new();
        let shared: Arc<dyn EventBus> = Arc::new(bus.clone());
        let subjects = SubjectScheme::default();

        let service = ProjectService::new(
            Arc::new(MemoryProjectStore::new()),
            Arc::clone(&shared),
            subjects.clone(),
        );
        let streamer = Arc::new(SubscriptionStreamer::new(
            Arc::clone(&shared),
            subjects.clone(),
        ));
        let distributor = Arc::new(UserEventsDistributor::new(
            DISTRIBUTOR_GROUP,
            subjects.clone(),
            shared,
        ));

        let cancel = CancellationToken::new();
        let distributor_handle = {
            let distributor = Arc::clone(&distributor);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                distributor.run(cancel).await.expect("distributor failed");
            })
        };

        let stack = Self {
            bus,
            service,
            streamer,
            distributor,
            cancel,
            distributor_handle,
        };
        stack
            .wait_for_subscribers(&SubjectScheme::default().project_pattern(), 1)
            .await;
        stack
    }

    /// Start streaming a device's view into a channel.
    async fn connect(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> (mpsc::Receiver<Project>, CancellationToken) {
        let (tx, rx) = mpsc::channel(16);
        let device = self.cancel.child_token();
        {
            let streamer = Arc::clone(&self.streamer);
            let device = device.clone();
            let user_id = user_id.to_string();
            let device_id = device_id.to_string();
            tokio::spawn(async move {
                streamer
                    .stream(&user_id, &device_id, &tx, &device)
                    .await
                    .expect("stream failed");
            });
        }

        let personal = SubjectScheme::default().user_events_subject(EventType::ProjectCreated, user_id);
        self.wait_for_subscribers(&personal, 1).await;
        (rx, device)
    }

    async fn wait_for_subscribers(&self, subject: &str, expected: usize) {
        for _ in 0..100 {
            if self.bus.subscriber_count_for(subject).await >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("subscribers for {} never reached {}", subject, expected);
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), self.distributor_handle)
            .await
            .expect("distributor did not stop")
            .expect("distributor task panicked");
        assert_eq!(self.distributor.state(), DistributorState::Stopped);
    }
}

async fn recv(rx: &mut mpsc::Receiver<Project>) -> Option<Project> {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .ok()
        .flatten()
}

async fn assert_quiet(rx: &mut mpsc::Receiver<Project>) {
    let extra = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
    assert!(extra.is_err(), "unexpected extra delivery: {:?}", extra);
}

#[tokio::test]
async fn test_participant_device_sees_project_changes() {
    let stack = Stack::start().await;
    let (mut device, _release) = stack.connect("2", "1").await;

    let project = stack
        .service
        .create_project("shared", "1", ["2"])
        .await
        .unwrap();
    assert_eq!(recv(&mut device).await, Some(project.clone()));

    let update = ProjectUpdate {
        mask: ["name"].into_iter().collect(),
        name: "renamed".to_string(),
        ..ProjectUpdate::default()
    };
    let updated = stack
        .service
        .update_project("1", &project.id, &update)
        .await
        .unwrap();
    assert_eq!(recv(&mut device).await, Some(updated.clone()));

    let task = stack
        .service
        .add_task(
            "2",
            &project.id,
            NewTask {
                title: "write tests".to_string(),
                ..NewTask::default()
            },
        )
        .await
        .unwrap();
    let with_task = recv(&mut device).await.expect("task update missing");
    assert_eq!(with_task.task(&task.id), Some(&task));

    stack.service.delete_project("1", &project.id).await.unwrap();
    let deleted = recv(&mut device).await.expect("delete notification missing");
    assert_eq!(deleted.id, project.id);

    assert_quiet(&mut device).await;
    stack.shutdown().await;
}

#[tokio::test]
async fn test_each_affected_user_receives_once() {
    let stack = Stack::start().await;
    let (mut owner, _o) = stack.connect("1", "phone").await;
    let (mut second, _s) = stack.connect("2", "phone").await;
    let (mut third, _t) = stack.connect("3", "laptop").await;
    let (mut outsider, _x) = stack.connect("4", "phone").await;

    let project = stack
        .service
        .create_project("team", "1", ["2", "3"])
        .await
        .unwrap();

    for device in [&mut owner, &mut second, &mut third] {
        assert_eq!(recv(device).await, Some(project.clone()));
        assert_quiet(device).await;
    }
    assert_quiet(&mut outsider).await;

    stack.shutdown().await;
}

#[tokio::test]
async fn test_every_device_of_a_user_receives() {
    let stack = Stack::start().await;
    let (mut phone, _p) = stack.connect("2", "phone").await;
    let personal = SubjectScheme::default().user_events_subject(EventType::ProjectCreated, "2");
    let (tx, mut laptop) = mpsc::channel(16);
    let laptop_cancel = stack.cancel.child_token();
    {
        let streamer = Arc::clone(&stack.streamer);
        let laptop_cancel = laptop_cancel.clone();
        tokio::spawn(async move {
            streamer
                .stream("2", "laptop", &tx, &laptop_cancel)
                .await
                .expect("stream failed");
        });
    }
    stack.wait_for_subscribers(&personal, 2).await;

    let project = stack.service.create_project("p", "1", ["2"]).await.unwrap();

    assert_eq!(recv(&mut phone).await, Some(project.clone()));
    assert_eq!(recv(&mut laptop).await, Some(project));

    stack.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_releases_subscription() {
    let stack = Stack::start().await;
    let personal = SubjectScheme::default().user_events_subject(EventType::ProjectUpdated, "2");

    let (mut device, release) = stack.connect("2", "1").await;
    assert_eq!(stack.bus.subscriber_count_for(&personal).await, 1);

    release.cancel();
    for _ in 0..100 {
        if stack.bus.subscriber_count_for(&personal).await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(stack.bus.subscriber_count_for(&personal).await, 0);

    // Writes after the disconnect still succeed and reach nobody
    stack.service.create_project("p", "1", ["2"]).await.unwrap();
    assert_eq!(recv(&mut device).await, None);

    stack.shutdown().await;
}

#[tokio::test]
async fn test_group_members_share_the_work() {
    let bus = ChannelEventBus::new();
    let shared: Arc<dyn EventBus> = Arc::new(bus.clone());
    let subjects = SubjectScheme::default();
    let service = ProjectService::new(
        Arc::new(MemoryProjectStore::new()),
        Arc::clone(&shared),
        subjects.clone(),
    );

    let cancel = CancellationToken::new();
    let mut handles = Vec::new();
    for _ in 0..2 {
        let distributor =
            UserEventsDistributor::new(DISTRIBUTOR_GROUP, subjects.clone(), Arc::clone(&shared));
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move { distributor.run(cancel).await }));
    }
    for _ in 0..100 {
        if bus.subscriber_count_for(&subjects.project_subject(EventType::ProjectCreated, "x")).await == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let mut personal = shared
        .subscribe(&subjects.user_events_pattern("2"), cancel.clone())
        .await
        .unwrap();

    let total = 6;
    for i in 0..total {
        service
            .create_project(&format!("p{}", i), "1", ["2"])
            .await
            .unwrap();
    }

    let mut received = 0;
    while received < total {
        let event = tokio::time::timeout(Duration::from_secs(1), personal.next())
            .await
            .expect("personal event missing")
            .expect("personal stream ended");
        assert_eq!(event.event_type, EventType::ProjectCreated);
        received += 1;
    }
    let extra = tokio::time::timeout(Duration::from_millis(50), personal.next()).await;
    assert!(extra.is_err(), "a group must deliver each event once");

    cancel.cancel();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}
