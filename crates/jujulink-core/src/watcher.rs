// ── Mega-watcher loop ──
//
// WatchAll → Next → Next → ... Each successful Next is re-issued before
// its batch is decoded, so the controller always has one Next pending.
// A Stop may race an outstanding Next; the resulting "watcher was
// stopped" error is swallowed.

use std::sync::Weak;

use jujulink_api::RpcResponse;
use jujulink_api::protocol::ERR_STOP_WATCHER;
use tracing::{debug, error, warn};

use crate::delta::sort_deltas;
use crate::event::SessionEvent;
use crate::reply::{Completer, Reply};
use crate::session::{Session, SessionInner};

impl Session {
    /// Start the mega-watcher unless one is already running or starting.
    pub fn start_watching(&self) {
        {
            let mut st = self.state();
            if st.watcher.handle.is_some() || st.watcher.starting {
                debug!("mega-watcher already running");
                return;
            }
            st.watcher.stopping = false;
            st.watcher.starting = true;
        }

        let start = PendingStart {
            session: self.downgrade(),
        };
        self.send(
            self.protocol().watch_all(),
            Box::new(move |resp| {
                let Some(session) = Session::upgrade(&start.session) else { return };
                session.handle_watch_all(resp);
            }),
        );
    }

    fn handle_watch_all(&self, resp: RpcResponse) {
        if let Some(err) = resp.error {
            error!(%err, "cannot start the mega-watcher");
            self.abandon_start();
            return;
        }
        let Some(id) = self.protocol().parse_watcher_id(&resp.response) else {
            error!("cannot start the mega-watcher: response carried no watcher id");
            self.abandon_start();
            return;
        };
        debug!(watcher_id = %id, "mega-watcher started");

        let deferred = {
            let mut st = self.state();
            st.watcher.starting = false;
            st.watcher.handle = Some(id.clone());
            std::mem::take(&mut st.watcher.deferred_stops)
        };
        if deferred.is_empty() {
            self.next(&id);
            return;
        }

        // Teardown began before the handle was known: stop instead of Next.
        debug!(watcher_id = %id, "stopping mega-watcher as soon as it started");
        self.send_stop(&id, deferred);
    }

    /// `WatchAll` failed, never left, or was abandoned: nothing to stop.
    fn abandon_start(&self) {
        let deferred = {
            let mut st = self.state();
            st.watcher.starting = false;
            st.watcher.stopping = false;
            std::mem::take(&mut st.watcher.deferred_stops)
        };
        for waiter in deferred {
            waiter.complete(());
        }
    }

    fn next(&self, watcher_id: &str) {
        let weak = self.downgrade();
        let id = watcher_id.to_owned();
        self.send(
            self.protocol().watcher_next(watcher_id),
            Box::new(move |resp| {
                let Some(session) = Session::upgrade(&weak) else { return };
                session.handle_next(&id, resp);
            }),
        );
    }

    fn handle_next(&self, watcher_id: &str, resp: RpcResponse) {
        if let Some(err) = resp.error {
            let mut st = self.state();
            if st.watcher.stopping && err == ERR_STOP_WATCHER {
                st.watcher.stopping = false;
                return;
            }
            drop(st);
            error!(%err, "mega-watcher stopped unexpectedly");
            return;
        }

        self.next(watcher_id);
        match self.protocol().parse_deltas(&resp.response) {
            Ok(mut batch) => {
                sort_deltas(&mut batch);
                debug!(count = batch.len(), "mega-watcher batch");
                self.emit(SessionEvent::Deltas(batch));
            }
            Err(e) => warn!(error = %e, "cannot decode mega-watcher batch"),
        }
    }

    /// Stop the mega-watcher. Resolves once the controller acknowledges
    /// the stop, or immediately if no watcher was started. A stop issued
    /// while `WatchAll` is outstanding waits for the handle, then stops.
    pub fn stop_watching(&self) -> Reply<()> {
        let open = self.is_open();
        let mut st = self.state();
        if let Some(handle) = st.watcher.handle.clone() {
            st.watcher.stopping = true;
            drop(st);
            let (completer, reply) = Reply::channel();
            self.send_stop(&handle, vec![completer]);
            return reply;
        }
        if st.watcher.starting && open {
            let (completer, reply) = Reply::channel();
            st.watcher.deferred_stops.push(completer);
            return reply;
        }
        drop(st);
        self.abandon_start();
        Reply::ready(())
    }

    /// Send `AllWatcher.Stop`; every waiter resolves on the acknowledgement.
    fn send_stop(&self, handle: &str, waiters: Vec<Completer<()>>) {
        let weak = self.downgrade();
        self.send(
            self.protocol().watcher_stop(handle),
            Box::new(move |resp| {
                if let Some(err) = &resp.error {
                    warn!(%err, "mega-watcher stop reported an error");
                }
                if let Some(session) = Session::upgrade(&weak) {
                    session.state().watcher.handle = None;
                }
                for waiter in waiters {
                    waiter.complete(());
                }
            }),
        );
    }
}

/// Rides along with the `WatchAll` handler. If the handler is dropped
/// without running (transport closed, requests abandoned), pending stops
/// are released.
struct PendingStart {
    session: Weak<SessionInner>,
}

impl Drop for PendingStart {
    fn drop(&mut self) {
        let Some(session) = Session::upgrade(&self.session) else { return };
        let starting = session.state().watcher.starting;
        if starting {
            session.abandon_start();
        }
    }
}
