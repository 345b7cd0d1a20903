//! End-to-end crawl tests against a mock portal

use crate::common::{
    aalink, mount_course, mount_file, mount_page, mount_resource, pluginfile_path, session_for,
};
use moodle_mirror::crawler::{
    download_course, Crawler, Dispatcher, DownloadOutcome, FilterSettings, SkipReason, TaskReport,
};
use moodle_mirror::state::TaskState;
use moodle_mirror::MirrorError;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pdf_only(dry_run: bool, overwrite: bool) -> FilterSettings {
    FilterSettings::new([".pdf"], dry_run, overwrite)
}

fn count(tasks: &[TaskReport], state: TaskState) -> usize {
    tasks.iter().filter(|t| t.state() == state).count()
}

fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn test_single_resource_end_to_end() {
    let server = MockServer::start().await;
    mount_course(
        &server,
        "42",
        "Linear Algebra",
        &aalink("/mod/resource/view.php?id=1", "Lecture 1"),
    )
    .await;
    mount_resource(&server, "1", "lecture01.pdf", b"%PDF-1.4 lecture").await;

    let out = tempfile::tempdir().unwrap();
    let crawler = Crawler::new(session_for(&server), pdf_only(false, false), out.path());
    let report = crawler.run(&["42".to_string()]).await.unwrap();

    let written = std::fs::read(out.path().join("lecture01.pdf")).unwrap();
    assert_eq!(written, b"%PDF-1.4 lecture");

    assert_eq!(report.courses.len(), 1);
    let target = report.courses[0].result.as_ref().unwrap();
    assert_eq!(target.title, "Linear Algebra");

    assert_eq!(report.tasks.len(), 1);
    assert!(matches!(
        report.tasks[0].outcome,
        DownloadOutcome::Saved { bytes: 16, .. }
    ));
}

#[tokio::test]
async fn test_extension_allowlist() {
    let server = MockServer::start().await;
    let body = format!(
        "{}{}",
        aalink("/mod/resource/view.php?id=1", "Slides"),
        aalink("/mod/resource/view.php?id=2", "Notes")
    );
    mount_course(&server, "7", "Databases", &body).await;
    mount_resource(&server, "1", "slides.pdf", b"pdf").await;
    mount_resource(&server, "2", "notes.docx", b"docx").await;

    let out = tempfile::tempdir().unwrap();
    let crawler = Crawler::new(session_for(&server), pdf_only(false, false), out.path());
    let report = crawler.run(&["7".to_string()]).await.unwrap();

    assert!(out.path().join("slides.pdf").exists());
    assert!(!out.path().join("notes.docx").exists());
    assert_eq!(count(&report.tasks, TaskState::Saved), 1);

    let skipped: Vec<_> = report
        .tasks
        .iter()
        .filter_map(|t| match &t.outcome {
            DownloadOutcome::Skipped(reason) => Some(reason.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        skipped,
        vec![SkipReason::ExtensionFiltered {
            file_name: "notes.docx".to_string()
        }]
    );
}

#[tokio::test]
async fn test_empty_allowlist_accepts_everything() {
    let server = MockServer::start().await;
    mount_course(
        &server,
        "7",
        "Databases",
        &aalink("/mod/resource/view.php?id=2", "Notes"),
    )
    .await;
    mount_resource(&server, "2", "notes.docx", b"docx").await;

    let out = tempfile::tempdir().unwrap();
    let crawler = Crawler::new(session_for(&server), FilterSettings::allow_all(), out.path());
    crawler.run(&["7".to_string()]).await.unwrap();

    assert_eq!(std::fs::read(out.path().join("notes.docx")).unwrap(), b"docx");
}

#[tokio::test]
async fn test_existing_file_is_left_untouched() {
    let server = MockServer::start().await;
    mount_course(
        &server,
        "42",
        "Linear Algebra",
        &aalink("/mod/resource/view.php?id=1", "Lecture 1"),
    )
    .await;
    mount_resource(&server, "1", "lecture01.pdf", b"new content").await;

    let out = tempfile::tempdir().unwrap();
    let existing = out.path().join("lecture01.pdf");
    std::fs::write(&existing, b"old content").unwrap();

    let crawler = Crawler::new(session_for(&server), pdf_only(false, false), out.path());
    let report = crawler.run(&["42".to_string()]).await.unwrap();

    assert_eq!(std::fs::read(&existing).unwrap(), b"old content");
    assert!(matches!(
        report.tasks[0].outcome,
        DownloadOutcome::Skipped(SkipReason::AlreadyExists { .. })
    ));

    // A second run is just as idempotent
    let report = crawler.run(&["42".to_string()]).await.unwrap();
    assert_eq!(count(&report.tasks, TaskState::Skipped), 1);
    assert_eq!(std::fs::read(&existing).unwrap(), b"old content");
}

#[tokio::test]
async fn test_overwrite_replaces_existing_file() {
    let server = MockServer::start().await;
    mount_course(
        &server,
        "42",
        "Linear Algebra",
        &aalink("/mod/resource/view.php?id=1", "Lecture 1"),
    )
    .await;
    mount_resource(&server, "1", "lecture01.pdf", b"new content").await;

    let out = tempfile::tempdir().unwrap();
    let existing = out.path().join("lecture01.pdf");
    std::fs::write(&existing, b"old content").unwrap();

    let crawler = Crawler::new(session_for(&server), pdf_only(false, true), out.path());
    crawler.run(&["42".to_string()]).await.unwrap();

    assert_eq!(std::fs::read(&existing).unwrap(), b"new content");
}

#[tokio::test]
async fn test_dry_run_creates_nothing() {
    let server = MockServer::start().await;
    let body = format!(
        "{}{}",
        aalink("/mod/resource/view.php?id=1", "Lecture 1"),
        aalink("/mod/folder/view.php?id=5", "Week 1")
    );
    mount_course(&server, "42", "Linear Algebra", &body).await;
    mount_resource(&server, "1", "lecture01.pdf", b"pdf").await;
    mount_page(
        &server,
        "/mod/folder/view.php",
        "5",
        r#"<span class="fp-filename-icon"><a href="/pluginfile.php/5/mod_folder/content/0/sheet1.pdf"><span>sheet1.pdf</span></a></span>"#,
    )
    .await;
    mount_file(&server, "/pluginfile.php/5/mod_folder/content/0/sheet1.pdf", b"sheet").await;

    let root = tempfile::tempdir().unwrap();
    let out = root.path().join("mirror");
    let crawler = Crawler::new(session_for(&server), pdf_only(true, true), &out);
    let report = crawler.run(&["42".to_string()]).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(count(&report.tasks, TaskState::Saved), 2);
    assert!(report.tasks.iter().all(|t| matches!(
        t.outcome,
        DownloadOutcome::Saved { bytes: 0, .. }
    )));
    assert!(!out.exists());
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn test_error_title_is_course_not_found() {
    let server = MockServer::start().await;
    mount_course(
        &server,
        "999",
        "Error",
        &aalink("/mod/folder/view.php?id=5", "Week 1"),
    )
    .await;

    let out = tempfile::tempdir().unwrap();
    let crawler = Crawler::new(session_for(&server), pdf_only(false, false), out.path());
    let mut dispatcher = Dispatcher::new(session_for(&server), 4);

    let result = download_course(&crawler, "999", &mut dispatcher).await;
    assert!(matches!(result, Err(MirrorError::CourseNotFound { ref course }) if course == "999"));
    assert_eq!(dispatcher.submitted(), 0);
    assert!(is_empty_dir(out.path()));
}

#[tokio::test]
async fn test_missing_course_does_not_stop_the_run() {
    let server = MockServer::start().await;
    mount_course(&server, "1", "Fehler", "").await;
    mount_course(
        &server,
        "2",
        "Algorithms",
        &aalink("/mod/resource/view.php?id=3", "Slides"),
    )
    .await;
    mount_resource(&server, "3", "slides.pdf", b"pdf").await;

    let out = tempfile::tempdir().unwrap();
    let crawler = Crawler::new(session_for(&server), pdf_only(false, false), out.path());
    let report = crawler
        .run(&["1".to_string(), "2".to_string()])
        .await
        .unwrap();

    assert!(matches!(
        report.courses[0].result,
        Err(MirrorError::CourseNotFound { .. })
    ));
    assert!(report.courses[1].result.is_ok());
    assert!(out.path().join("slides.pdf").exists());
}

#[tokio::test]
async fn test_folder_is_expanded_into_subdirectory() {
    let server = MockServer::start().await;
    mount_course(
        &server,
        "42",
        "Linear Algebra",
        &aalink("/mod/folder/view.php?id=5", "Week%201"),
    )
    .await;
    mount_page(
        &server,
        "/mod/folder/view.php",
        "5",
        r#"<ul>
            <li><span class="fp-filename-icon"><a href="/pluginfile.php/5/mod_folder/content/0/sheet1.pdf"><span>sheet1.pdf</span></a></span></li>
            <li><span class="fp-filename-icon"><a href="/pluginfile.php/5/mod_folder/content/0/sheet2.pdf"><span>sheet2.pdf</span></a></span></li>
            <li><a href="/pluginfile.php/5/mod_folder/content/0/not-a-child.pdf">outside the listing</a></li>
        </ul>"#,
    )
    .await;
    mount_file(&server, "/pluginfile.php/5/mod_folder/content/0/sheet1.pdf", b"one").await;
    mount_file(&server, "/pluginfile.php/5/mod_folder/content/0/sheet2.pdf", b"two").await;

    let out = tempfile::tempdir().unwrap();
    let crawler = Crawler::new(session_for(&server), pdf_only(false, false), out.path());
    let report = crawler.run(&["42".to_string()]).await.unwrap();

    let folder = out.path().join("Week 1");
    assert_eq!(std::fs::read(folder.join("sheet1.pdf")).unwrap(), b"one");
    assert_eq!(std::fs::read(folder.join("sheet2.pdf")).unwrap(), b"two");
    assert!(!folder.join("not-a-child.pdf").exists());
    assert_eq!(count(&report.tasks, TaskState::Saved), 2);
}

#[tokio::test]
async fn test_assignment_submissions_are_downloaded() {
    let server = MockServer::start().await;
    mount_course(
        &server,
        "42",
        "Linear Algebra",
        &aalink("/mod/assign/view.php?id=6", "Homework 1"),
    )
    .await;
    mount_page(
        &server,
        "/mod/assign/view.php",
        "6",
        r#"<div class="fileuploadsubmission"><a href="/pluginfile.php/6/assignsubmission_file/submission_files/1/solution.pdf">solution.pdf</a></div>"#,
    )
    .await;
    mount_file(
        &server,
        "/pluginfile.php/6/assignsubmission_file/submission_files/1/solution.pdf",
        b"solution",
    )
    .await;

    let out = tempfile::tempdir().unwrap();
    let crawler = Crawler::new(session_for(&server), pdf_only(false, false), out.path());
    crawler.run(&["42".to_string()]).await.unwrap();

    assert_eq!(
        std::fs::read(out.path().join("Homework 1").join("solution.pdf")).unwrap(),
        b"solution"
    );
}

#[tokio::test]
async fn test_broken_container_is_reported_and_siblings_continue() {
    let server = MockServer::start().await;
    let body = format!(
        "{}{}",
        aalink("/mod/folder/view.php?id=5", "Broken"),
        aalink("/mod/resource/view.php?id=1", "Lecture 1")
    );
    mount_course(&server, "42", "Linear Algebra", &body).await;
    mount_resource(&server, "1", "lecture01.pdf", b"pdf").await;
    // Folder page itself is not mounted: HEAD and GET answer 404

    let out = tempfile::tempdir().unwrap();
    let crawler = Crawler::new(session_for(&server), pdf_only(false, false), out.path());
    let report = crawler.run(&["42".to_string()]).await.unwrap();

    assert!(out.path().join("lecture01.pdf").exists());
    assert_eq!(count(&report.tasks, TaskState::Saved), 1);
    assert_eq!(count(&report.tasks, TaskState::Failed), 1);
    assert!(report.tasks.iter().any(|t| matches!(
        t.outcome,
        DownloadOutcome::Failed(MirrorError::Status { status: 404, .. })
    )));
}

#[tokio::test]
async fn test_transport_failures_are_isolated() {
    let server = MockServer::start().await;
    let body = format!(
        "{}{}{}",
        aalink("/mod/resource/view.php?id=1", "Lecture 1"),
        aalink("/mod/resource/view.php?id=2", "Broken"),
        aalink("http://127.0.0.1:9/mod/resource/view.php?id=3", "Unreachable")
    );
    mount_course(&server, "42", "Linear Algebra", &body).await;
    mount_resource(&server, "1", "lecture01.pdf", b"pdf").await;
    // The first mounted match wins, so the failing download shadows the file mock
    Mock::given(method("GET"))
        .and(path(pluginfile_path("2", "broken.pdf")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_resource(&server, "2", "broken.pdf", b"").await;

    let out = tempfile::tempdir().unwrap();
    let crawler = Crawler::new(session_for(&server), pdf_only(false, false), out.path());
    let report = crawler.run(&["42".to_string()]).await.unwrap();

    assert!(out.path().join("lecture01.pdf").exists());
    assert!(!out.path().join("broken.pdf").exists());
    assert_eq!(report.tasks.len(), 3);
    assert_eq!(count(&report.tasks, TaskState::Saved), 1);
    assert_eq!(count(&report.tasks, TaskState::Failed), 2);
    assert!(report.tasks.iter().any(|t| matches!(
        t.outcome,
        DownloadOutcome::Failed(MirrorError::Status { status: 500, .. })
    )));
    assert!(report.tasks.iter().any(|t| matches!(
        t.outcome,
        DownloadOutcome::Failed(MirrorError::Http { .. })
    )));
}

#[tokio::test]
async fn test_duplicate_destination_is_written_once() {
    let server = MockServer::start().await;
    let body = format!(
        "{}{}",
        aalink("/mod/resource/view.php?id=1", "Slides"),
        aalink("/mod/resource/view.php?id=2", "Slides again")
    );
    mount_course(&server, "42", "Linear Algebra", &body).await;
    mount_resource(&server, "1", "slides.pdf", b"first").await;
    mount_resource(&server, "2", "slides.pdf", b"second").await;

    let out = tempfile::tempdir().unwrap();
    let crawler = Crawler::new(session_for(&server), pdf_only(false, false), out.path());
    let report = crawler.run(&["42".to_string()]).await.unwrap();

    assert_eq!(count(&report.tasks, TaskState::Saved), 1);
    assert!(report.tasks.iter().any(|t| matches!(
        t.outcome,
        DownloadOutcome::Skipped(SkipReason::DuplicateDestination { .. })
    )));
    let written = std::fs::read(out.path().join("slides.pdf")).unwrap();
    assert!(written == b"first" || written == b"second");
}

#[tokio::test]
async fn test_force_mode_expands_plain_anchors() {
    let server = MockServer::start().await;
    let body = format!(
        r#"{}
        <a href="/mod/page/view.php?id=9">Extra material</a>
        <a href="/login/logout.php?sesskey=abc">Log out</a>
        <a href="https://www.youtube.com/watch?v=1">Recording</a>"#,
        aalink("/mod/resource/view.php?id=1", "Lecture 1")
    );
    mount_course(&server, "42", "Linear Algebra", &body).await;
    mount_resource(&server, "1", "lecture01.pdf", b"pdf").await;
    mount_page(
        &server,
        "/mod/page/view.php",
        "9",
        r#"<p><a href="/pluginfile.php/9/mod_page/content/extra.pdf">extra.pdf</a></p>"#,
    )
    .await;
    mount_file(&server, "/pluginfile.php/9/mod_page/content/extra.pdf", b"extra").await;

    // Without force the plain anchor is ignored
    let out = tempfile::tempdir().unwrap();
    let crawler = Crawler::new(session_for(&server), pdf_only(false, false), out.path());
    crawler.run(&["42".to_string()]).await.unwrap();
    assert!(out.path().join("lecture01.pdf").exists());
    assert!(!out.path().join("extra.pdf").exists());

    let out = tempfile::tempdir().unwrap();
    let crawler =
        Crawler::new(session_for(&server), pdf_only(false, false), out.path()).with_force(true);
    let report = crawler.run(&["42".to_string()]).await.unwrap();

    assert_eq!(std::fs::read(out.path().join("extra.pdf")).unwrap(), b"extra");
    assert!(out.path().join("lecture01.pdf").exists());
    assert_eq!(count(&report.tasks, TaskState::Failed), 0);
    assert!(report.tasks.iter().all(|t| !matches!(
        t.outcome,
        DownloadOutcome::Skipped(SkipReason::DuplicateDestination { .. })
    )));
}

#[tokio::test]
async fn test_force_mode_never_requests_logout_on_expanded_pages() {
    let server = MockServer::start().await;
    mount_course(
        &server,
        "42",
        "Linear Algebra",
        r#"<a href="/mod/page/view.php?id=9">Extra material</a>"#,
    )
    .await;
    mount_page(
        &server,
        "/mod/page/view.php",
        "9",
        r#"<a href="/pluginfile.php/9/mod_page/content/extra.pdf">extra.pdf</a>
        <a href="/login/logout.php?sesskey=abc">Log out</a>
        <a href="https://www.youtube.com/watch?v=1">Recording</a>"#,
    )
    .await;
    mount_file(&server, "/pluginfile.php/9/mod_page/content/extra.pdf", b"extra").await;
    Mock::given(path("/login/logout.php"))
        .respond_with(ResponseTemplate::new(303).insert_header("location", "/login/index.php"))
        .expect(0)
        .mount(&server)
        .await;

    let out = tempfile::tempdir().unwrap();
    let crawler =
        Crawler::new(session_for(&server), pdf_only(false, false), out.path()).with_force(true);
    let report = crawler.run(&["42".to_string()]).await.unwrap();

    assert_eq!(std::fs::read(out.path().join("extra.pdf")).unwrap(), b"extra");
    assert_eq!(report.tasks.len(), 1);

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/login/logout.php"));
}

#[tokio::test]
async fn test_failed_copy_does_not_block_good_copy() {
    let server = MockServer::start().await;
    let body = format!(
        "{}{}",
        aalink("/mod/resource/view.php?id=1", "Slides (broken)"),
        aalink("/mod/resource/view.php?id=2", "Slides")
    );
    mount_course(&server, "42", "Linear Algebra", &body).await;
    Mock::given(method("GET"))
        .and(path(pluginfile_path("1", "slides.pdf")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_resource(&server, "1", "slides.pdf", b"").await;
    mount_resource(&server, "2", "slides.pdf", b"good").await;

    let out = tempfile::tempdir().unwrap();
    let crawler = Crawler::new(session_for(&server), pdf_only(false, false), out.path())
        .with_max_concurrent(1);
    let report = crawler.run(&["42".to_string()]).await.unwrap();

    assert_eq!(std::fs::read(out.path().join("slides.pdf")).unwrap(), b"good");
    assert_eq!(count(&report.tasks, TaskState::Saved), 1);
    assert_eq!(count(&report.tasks, TaskState::Failed), 1);
    assert_eq!(count(&report.tasks, TaskState::Skipped), 0);
}

#[tokio::test]
async fn test_dry_run_reports_duplicates_like_a_real_run() {
    let server = MockServer::start().await;
    let body = format!(
        "{}{}",
        aalink("/mod/resource/view.php?id=1", "Slides"),
        aalink("/mod/resource/view.php?id=2", "Slides again")
    );
    mount_course(&server, "42", "Linear Algebra", &body).await;
    mount_resource(&server, "1", "slides.pdf", b"first").await;
    mount_resource(&server, "2", "slides.pdf", b"second").await;

    let root = tempfile::tempdir().unwrap();
    let out = root.path().join("mirror");
    let crawler = Crawler::new(session_for(&server), pdf_only(true, false), &out);
    let report = crawler.run(&["42".to_string()]).await.unwrap();

    assert_eq!(count(&report.tasks, TaskState::Saved), 1);
    assert!(report.tasks.iter().any(|t| matches!(
        t.outcome,
        DownloadOutcome::Skipped(SkipReason::DuplicateDestination { .. })
    )));
    assert!(!out.exists());
}
