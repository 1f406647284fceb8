//! Top-level orchestrator: first-run seeding, steady-state polling,
//! per-cycle fault containment.
//!
//! Single logical thread of control: no cycle starts before the previous
//! one (and all of its network calls) has finished, so the session and
//! the ledger are exclusively owned here and need no locking. The sleep
//! is measured from the end of one cycle to the start of the next;
//! cadence drift is accepted, not corrected.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    attachments,
    detector::ClassCodeDetector,
    domain::{AttachmentPayload, Bulletin, Scope, Session},
    extract::TextExtractor,
    formatting::{compose_message, strip_tags},
    ledger::{id_hash, SeenLedger},
    notify::{dispatch, Notifier},
    source::BulletinSource,
    Result,
};

pub struct Monitor {
    source: Arc<dyn BulletinSource>,
    notifier: Arc<dyn Notifier>,
    extractor: Arc<dyn TextExtractor>,
    detector: ClassCodeDetector,
    ledger: SeenLedger,
    interval: Duration,
}

impl Monitor {
    pub fn new(
        source: Arc<dyn BulletinSource>,
        notifier: Arc<dyn Notifier>,
        extractor: Arc<dyn TextExtractor>,
        ledger: SeenLedger,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            notifier,
            extractor,
            detector: ClassCodeDetector::new(),
            ledger,
            interval,
        }
    }

    /// Run until cancelled. No cycle failure is fatal: every error is
    /// caught here, logged, and the loop proceeds to the next sleep.
    pub async fn run(mut self, cancel: CancellationToken) {
        if self.ledger.is_empty() {
            info!("empty ledger, seeding from the full backlog");
            if let Err(e) = self.first_check().await {
                error!("first check failed, continuing: {e}");
            }
        } else {
            info!(seen = self.ledger.len(), "resuming steady-state monitoring");
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("stop requested, shutting down");
                    break;
                }
                _ = sleep(self.interval) => {}
            }

            match self.run_cycle().await {
                Ok(0) => {}
                Ok(n) => info!(new = n, "cycle complete"),
                Err(e) => warn!("cycle skipped: {e}"),
            }
        }
    }

    /// First run only: fetch the full backlog, dispatch just the newest
    /// entry, but mark every fetched hash so startup never floods while
    /// still preventing future re-delivery of the backlog.
    async fn first_check(&mut self) -> Result<()> {
        let session = self.source.login().await?;
        let bulletins = match self.source.fetch(&session, Scope::All).await {
            Ok(b) => b,
            Err(e) => {
                warn!("fetch failed, treating as empty: {e}");
                Vec::new()
            }
        };
        if bulletins.is_empty() {
            return Ok(());
        }

        self.process_bulletin(&session, &bulletins[0]).await;

        for bulletin in &bulletins {
            self.ledger.mark(id_hash(&bulletin.id));
        }
        self.persist_ledger();
        Ok(())
    }

    /// One steady-state cycle. Returns the number of bulletins dispatched.
    ///
    /// An auth failure aborts the cycle (propagated to the caller); a
    /// fetch failure degrades to an empty batch.
    async fn run_cycle(&mut self) -> Result<usize> {
        let session = self.source.login().await?;
        let bulletins = match self.source.fetch(&session, Scope::New).await {
            Ok(b) => b,
            Err(e) => {
                warn!("fetch failed, treating as empty: {e}");
                return Ok(0);
            }
        };

        let mut processed = 0usize;
        for bulletin in &bulletins {
            let hash = id_hash(&bulletin.id);
            if self.ledger.contains(&hash) {
                continue;
            }
            self.process_bulletin(&session, bulletin).await;
            self.ledger.mark(hash);
            processed += 1;
        }

        if processed > 0 {
            self.persist_ledger();
        }
        Ok(processed)
    }

    /// Full pipeline for one bulletin: detect → resolve → download →
    /// detect in decoded documents → compose → dispatch.
    ///
    /// Dispatch failures are logged and never block marking: at-most-once
    /// delivery beats infinite reprocessing of a poison item.
    async fn process_bulletin(&self, session: &Session, bulletin: &Bulletin) {
        let mut classes = self.detector.detect(&bulletin.title);
        classes.extend(self.detector.detect(&strip_tags(&bulletin.body)));

        let refs = attachments::resolve(bulletin);
        let mut payloads = Vec::with_capacity(refs.len());
        for attachment in &refs {
            let bytes = match self.source.download(session, attachment).await {
                Ok(b) => b,
                Err(e) => {
                    // omit this attachment; the message and the rest proceed
                    warn!("skipping attachment: {e}");
                    continue;
                }
            };

            match self.extractor.extract(&bytes) {
                Ok(text) => classes.extend(self.detector.detect(&text)),
                Err(e) => warn!(filename = %attachment.filename, "document scan skipped: {e}"),
            }

            payloads.push(AttachmentPayload {
                filename: attachment.filename.clone(),
                bytes,
            });
        }

        let message = compose_message(bulletin, &classes);
        if let Err(e) = dispatch(self.notifier.as_ref(), &message, &payloads).await {
            warn!(id = %bulletin.id, "dispatch failed, bulletin is still marked processed: {e}");
        }
    }

    fn persist_ledger(&self) {
        if let Err(e) = self.ledger.persist() {
            warn!("ledger persist failed, in-memory state stays authoritative: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::AttachmentRef, extract::ExtractError, Error};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn bulletin(id: &str, title: &str, body: &str) -> Bulletin {
        Bulletin {
            id: id.to_string(),
            title: title.to_string(),
            date: "2024-03-01".to_string(),
            body: body.to_string(),
            read: false,
            attachments: Vec::new(),
        }
    }

    fn with_attachments(mut b: Bulletin, ids: &[&str]) -> Bulletin {
        b.attachments = ids
            .iter()
            .map(|id| AttachmentRef {
                id: id.to_string(),
                filename: format!("allegato_{id}.pdf"),
            })
            .collect();
        b
    }

    #[derive(Default)]
    struct FakeSource {
        all: Vec<Bulletin>,
        new: Vec<Bulletin>,
        login_fails: bool,
        fetch_fails: bool,
        downloads: HashMap<String, Vec<u8>>,
        login_calls: Mutex<usize>,
    }

    #[async_trait]
    impl BulletinSource for FakeSource {
        async fn login(&self) -> Result<Session> {
            *self.login_calls.lock().unwrap() += 1;
            if self.login_fails {
                return Err(Error::Auth("upstream rejected login".into()));
            }
            Ok(Session {
                session_id: "sid".to_string(),
                identity: "idy".to_string(),
            })
        }

        async fn fetch(&self, _session: &Session, scope: Scope) -> Result<Vec<Bulletin>> {
            if self.fetch_fails {
                return Err(Error::Fetch("boom".into()));
            }
            Ok(match scope {
                Scope::All => self.all.clone(),
                Scope::New => self.new.clone(),
            })
        }

        async fn download(&self, _session: &Session, attachment: &AttachmentRef) -> Result<Vec<u8>> {
            self.downloads
                .get(&attachment.id)
                .cloned()
                .ok_or_else(|| Error::Download {
                    id: attachment.id.clone(),
                    reason: "missing".into(),
                })
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Text(String),
        Document { filename: String, caption: String },
        Group(usize),
    }

    #[derive(Default)]
    struct RecordingNotifier {
        calls: Mutex<Vec<Call>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn calls(&self) -> std::sync::MutexGuard<'_, Vec<Call>> {
            self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_text(&self, text: &str) -> Result<()> {
            self.calls().push(Call::Text(text.to_string()));
            if self.fail {
                return Err(Error::Dispatch("refused".into()));
            }
            Ok(())
        }

        async fn send_document(&self, doc: &AttachmentPayload, caption: &str) -> Result<()> {
            self.calls().push(Call::Document {
                filename: doc.filename.clone(),
                caption: caption.to_string(),
            });
            if self.fail {
                return Err(Error::Dispatch("refused".into()));
            }
            Ok(())
        }

        async fn send_document_group(&self, docs: &[AttachmentPayload]) -> Result<()> {
            self.calls().push(Call::Group(docs.len()));
            if self.fail {
                return Err(Error::Dispatch("refused".into()));
            }
            Ok(())
        }
    }

    /// Treats downloaded bytes as UTF-8 text so tests control the
    /// "decoded document" content directly.
    struct Utf8Extractor;

    impl TextExtractor for Utf8Extractor {
        fn extract(&self, data: &[u8]) -> std::result::Result<String, ExtractError> {
            Ok(String::from_utf8_lossy(data).into_owned())
        }
    }

    struct FailingExtractor;

    impl TextExtractor for FailingExtractor {
        fn extract(&self, _data: &[u8]) -> std::result::Result<String, ExtractError> {
            Err(ExtractError::Decode("bad document".into()))
        }
    }

    struct Fixture {
        source: Arc<FakeSource>,
        notifier: Arc<RecordingNotifier>,
        state_file: PathBuf,
        _dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new(source: FakeSource) -> Self {
            Self::with_notifier(source, RecordingNotifier::default())
        }

        fn with_notifier(source: FakeSource, notifier: RecordingNotifier) -> Self {
            let dir = tempfile::tempdir().unwrap();
            Self {
                source: Arc::new(source),
                notifier: Arc::new(notifier),
                state_file: dir.path().join("state.json"),
                _dir: dir,
            }
        }

        fn monitor(&self) -> Monitor {
            self.monitor_with_extractor(Arc::new(Utf8Extractor))
        }

        fn monitor_with_extractor(&self, extractor: Arc<dyn TextExtractor>) -> Monitor {
            Monitor::new(
                self.source.clone(),
                self.notifier.clone(),
                extractor,
                SeenLedger::load(&self.state_file),
                Duration::from_secs(60),
            )
        }
    }

    #[tokio::test]
    async fn first_check_notifies_newest_only_but_marks_all() {
        let fx = Fixture::new(FakeSource {
            all: vec![
                bulletin("a", "Newest", ""),
                bulletin("b", "Older", ""),
                bulletin("c", "Oldest", ""),
            ],
            ..Default::default()
        });

        let mut monitor = fx.monitor();
        monitor.first_check().await.unwrap();

        let calls = fx.notifier.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], Call::Text(msg) if msg.contains("Newest")));

        for id in ["a", "b", "c"] {
            assert!(monitor.ledger.contains(&id_hash(id)));
        }
        // persisted: a fresh load sees all three
        let reloaded = SeenLedger::load(&fx.state_file);
        assert_eq!(reloaded.len(), 3);
    }

    #[tokio::test]
    async fn first_check_with_empty_backlog_does_nothing() {
        let fx = Fixture::new(FakeSource::default());

        let mut monitor = fx.monitor();
        monitor.first_check().await.unwrap();

        assert!(fx.notifier.calls().is_empty());
        assert!(monitor.ledger.is_empty());
        assert!(!fx.state_file.exists());
    }

    #[tokio::test]
    async fn steady_cycle_skips_items_already_in_ledger() {
        let fx = Fixture::new(FakeSource {
            new: vec![bulletin("a", "Seen before", "")],
            ..Default::default()
        });

        let mut ledger = SeenLedger::load(&fx.state_file);
        ledger.mark(id_hash("a"));
        ledger.persist().unwrap();

        let mut monitor = fx.monitor();
        let processed = monitor.run_cycle().await.unwrap();

        assert_eq!(processed, 0);
        assert!(fx.notifier.calls().is_empty());
        assert_eq!(monitor.ledger.len(), 1);
    }

    #[tokio::test]
    async fn steady_cycle_dispatches_unseen_and_persists_once() {
        let fx = Fixture::new(FakeSource {
            new: vec![bulletin("a", "First", ""), bulletin("b", "Second", "")],
            ..Default::default()
        });

        let mut monitor = fx.monitor();
        let processed = monitor.run_cycle().await.unwrap();
        assert_eq!(processed, 2);
        assert_eq!(fx.notifier.calls().len(), 2);

        // crash-recovery: a restarted monitor must not re-deliver
        let fx2 = Fixture::new(FakeSource {
            new: vec![bulletin("a", "First", ""), bulletin("b", "Second", "")],
            ..Default::default()
        });
        let mut restarted = Monitor::new(
            fx2.source.clone(),
            fx2.notifier.clone(),
            Arc::new(Utf8Extractor),
            SeenLedger::load(&fx.state_file),
            Duration::from_secs(60),
        );
        assert_eq!(restarted.run_cycle().await.unwrap(), 0);
        assert!(fx2.notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn dispatch_failure_still_marks_the_item() {
        let fx = Fixture::with_notifier(
            FakeSource {
                new: vec![bulletin("a", "Lost", "")],
                ..Default::default()
            },
            RecordingNotifier {
                fail: true,
                ..Default::default()
            },
        );

        let mut monitor = fx.monitor();
        let processed = monitor.run_cycle().await.unwrap();

        assert_eq!(processed, 1);
        assert!(monitor.ledger.contains(&id_hash("a")));
    }

    #[tokio::test]
    async fn login_failure_aborts_the_cycle() {
        let fx = Fixture::new(FakeSource {
            new: vec![bulletin("a", "Unreachable", "")],
            login_fails: true,
            ..Default::default()
        });

        let mut monitor = fx.monitor();
        let err = monitor.run_cycle().await.unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
        assert!(fx.notifier.calls().is_empty());
        assert!(monitor.ledger.is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_degrades_to_empty_batch() {
        let fx = Fixture::new(FakeSource {
            fetch_fails: true,
            ..Default::default()
        });

        let mut monitor = fx.monitor();
        assert_eq!(monitor.run_cycle().await.unwrap(), 0);
        assert!(fx.notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn two_attachments_route_text_then_captionless_group() {
        let b = with_attachments(bulletin("a", "Circolare", ""), &["1", "2"]);
        let fx = Fixture::new(FakeSource {
            new: vec![b],
            downloads: HashMap::from([
                ("1".to_string(), b"one".to_vec()),
                ("2".to_string(), b"two".to_vec()),
            ]),
            ..Default::default()
        });

        fx.monitor().run_cycle().await.unwrap();

        let calls = fx.notifier.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(&calls[0], Call::Text(_)));
        assert_eq!(calls[1], Call::Group(2));
    }

    #[tokio::test]
    async fn failed_download_omits_that_attachment_only() {
        // two referenced, one downloadable: routing degrades to the
        // single-document shape
        let b = with_attachments(bulletin("a", "Circolare", ""), &["1", "2"]);
        let fx = Fixture::new(FakeSource {
            new: vec![b],
            downloads: HashMap::from([("2".to_string(), b"two".to_vec())]),
            ..Default::default()
        });

        fx.monitor().run_cycle().await.unwrap();

        let calls = fx.notifier.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            &calls[0],
            Call::Document { filename, .. } if filename == "allegato_2.pdf"
        ));
    }

    #[tokio::test]
    async fn decoded_document_text_feeds_class_detection() {
        let b = with_attachments(bulletin("a", "Uscita", ""), &["1"]);
        let fx = Fixture::new(FakeSource {
            new: vec![b],
            downloads: HashMap::from([("1".to_string(), b"convocate le classi 4DD e 1AA".to_vec())]),
            ..Default::default()
        });

        fx.monitor().run_cycle().await.unwrap();

        let calls = fx.notifier.calls();
        assert!(matches!(
            &calls[0],
            Call::Document { caption, .. } if caption.contains("1AA, 4DD")
        ));
    }

    #[tokio::test]
    async fn decode_failure_skips_document_scan_but_still_sends() {
        let b = with_attachments(bulletin("a", "Uscita classi 2BB", ""), &["1"]);
        let fx = Fixture::new(FakeSource {
            new: vec![b],
            downloads: HashMap::from([("1".to_string(), b"garbled".to_vec())]),
            ..Default::default()
        });

        fx.monitor_with_extractor(Arc::new(FailingExtractor))
            .run_cycle()
            .await
            .unwrap();

        let calls = fx.notifier.calls();
        assert_eq!(calls.len(), 1);
        // text-derived codes survive, document-derived ones are absent
        assert!(matches!(
            &calls[0],
            Call::Document { caption, .. } if caption.contains("2BB")
        ));
    }

    #[tokio::test]
    async fn every_cycle_acquires_a_fresh_session() {
        let fx = Fixture::new(FakeSource::default());

        let mut monitor = fx.monitor();
        monitor.run_cycle().await.unwrap();
        monitor.run_cycle().await.unwrap();

        assert_eq!(*fx.source.login_calls.lock().unwrap(), 2);
    }
}
