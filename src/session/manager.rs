use super::*;

use uuid::Uuid;

impl SessionManager {
    /// Creates a manager with the given settings. The sweep task starts
    /// with [`SessionManager::start`].
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            table: Arc::new(RwLock::new(SessionTable::default())),
            sweeper: Mutex::new(None),
        }
    }

    /// Starts the expiry sweep task. Calling twice is a no-op.
    pub async fn start(&self) {
        let mut sweeper = self.sweeper.lock().await;
        if sweeper.is_some() {
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let table = self.table.clone();
        let settings = self.settings;

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(settings.sweep_interval) => {
                        match Self::sweep_expired(&table, settings.session_timeout).await {
                            Ok(0) => {}
                            Ok(swept) => info!("swept {swept} expired sessions"),
                            Err(err) => {
                                error!("session sweep failed: {err}");
                                tokio::time::sleep(Duration::from_secs(5)).await;
                            }
                        }
                    }
                }
            }
            debug!("session sweep task stopped");
        });

        *sweeper = Some(SweeperHandle { shutdown, handle });
        info!("session manager started");
    }

    /// Signals the sweeper, awaits it, then force-closes every remaining
    /// session.
    pub async fn stop(&self) {
        let taken = { self.sweeper.lock().await.take() };
        if let Some(SweeperHandle { shutdown, handle }) = taken {
            let _ = shutdown.send(true);
            let _ = handle.await;
        }

        let session_ids: Vec<String> = {
            let table = self.table.read().await;
            table.sessions.keys().cloned().collect()
        };
        for session_id in session_ids {
            self.close(&session_id).await;
        }
        info!("session manager stopped");
    }

    /// Opens a connection and registers a session for it.
    ///
    /// Returns `None` (not an error) when the user is at quota or the
    /// connection cannot be established.
    pub async fn create(&self, profile: &DeviceProfile, user_id: Option<&str>) -> Option<String> {
        if self.user_at_quota(user_id).await {
            warn!(
                "user {} is at the session quota ({})",
                user_id.unwrap_or("<anonymous>"),
                self.settings.max_sessions_per_user
            );
            return None;
        }

        match Connection::open(profile, ConnectionSettings::persistent()).await {
            Ok(connection) => self.admit(profile, user_id, connection).await,
            Err(err) => {
                error!(
                    "unable to connect to device {} ({}): {err}",
                    profile.name, profile.host
                );
                None
            }
        }
    }

    /// Registers an already-open connection as a session. The quota is
    /// re-checked under the table lock.
    pub(crate) async fn admit(
        &self,
        profile: &DeviceProfile,
        user_id: Option<&str>,
        connection: Connection,
    ) -> Option<String> {
        let mut table = self.table.write().await;

        if let Some(user) = user_id {
            let open = table.by_user.get(user).map(HashSet::len).unwrap_or(0);
            if open >= self.settings.max_sessions_per_user {
                drop(table);
                let mut connection = connection;
                connection.disconnect().await;
                warn!(
                    "user {user} reached the session quota ({})",
                    self.settings.max_sessions_per_user
                );
                return None;
            }
        }

        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let session = Session {
            session_id: session_id.clone(),
            user_id: user_id.map(str::to_string),
            device_id: profile.device_id.clone(),
            device_name: profile.name.clone(),
            connection,
            created_at: now,
            last_activity: now,
            is_active: true,
        };

        table
            .sessions
            .insert(session_id.clone(), Arc::new(RwLock::new(session)));
        if let Some(user) = user_id {
            table
                .by_user
                .entry(user.to_string())
                .or_default()
                .insert(session_id.clone());
        }
        table
            .by_device
            .entry(profile.device_id.clone())
            .or_default()
            .insert(session_id.clone());

        info!(
            "created session {session_id} for device {} (user: {})",
            profile.name,
            user_id.unwrap_or("<anonymous>")
        );
        Some(session_id)
    }

    /// Returns the session and refreshes `last_activity` iff it is
    /// active. This access path is the only thing that extends a
    /// session's life.
    pub async fn get(&self, session_id: &str) -> Option<SessionSnapshot> {
        let session = self.touch(session_id).await?;
        let guard = session.read().await;
        Some(guard.snapshot())
    }

    /// Reads session details without refreshing activity.
    pub async fn session_info(&self, session_id: &str) -> Option<SessionSnapshot> {
        let session = {
            let table = self.table.read().await;
            table.sessions.get(session_id)?.clone()
        };
        let guard = session.read().await;
        guard.is_active.then(|| guard.snapshot())
    }

    /// Executes a command in the session. Unknown or expired ids produce
    /// a failed outcome; nothing is raised past this boundary.
    pub async fn execute_command(&self, session_id: &str, command: &str) -> CommandOutcome {
        let Some(session) = self.touch(session_id).await else {
            return CommandOutcome::failure(
                command,
                NetError::SessionNotFound(session_id.to_string()).to_string(),
            );
        };
        let mut guard = session.write().await;
        guard.connection.execute_command(command).await
    }

    /// Streams a command's output as line-tagged chunks.
    pub async fn execute_interactive_command(
        &self,
        session_id: &str,
        command: &str,
    ) -> mpsc::Receiver<CommandChunk> {
        let Some(session) = self.touch(session_id).await else {
            let (tx, rx) = mpsc::channel(1);
            let error = NetError::SessionNotFound(session_id.to_string()).to_string();
            let _ = tx.try_send(CommandChunk::error(command, error));
            return rx;
        };
        let mut guard = session.write().await;
        guard.connection.execute_interactive_command(command).await
    }

    /// Applies a configuration batch through the session.
    pub async fn send_configuration(
        &self,
        session_id: &str,
        config_lines: &[String],
    ) -> ConfigPushOutcome {
        let Some(session) = self.touch(session_id).await else {
            return ConfigPushOutcome {
                success: false,
                config_lines: config_lines.to_vec(),
                output: None,
                error: Some(NetError::SessionNotFound(session_id.to_string()).to_string()),
                timestamp: Utc::now(),
            };
        };
        let mut guard = session.write().await;
        guard.connection.send_configuration(config_lines).await
    }

    /// Closes a session: disconnects, marks inactive and removes it from
    /// every index. Returns `false` for unknown ids.
    pub async fn close(&self, session_id: &str) -> bool {
        let known = {
            let table = self.table.read().await;
            table.sessions.contains_key(session_id)
        };
        if !known {
            return false;
        }
        Self::remove_session(&self.table, session_id).await;
        info!("closed session {session_id}");
        true
    }

    /// Lists active sessions, optionally filtered by user and device.
    pub async fn list_sessions(
        &self,
        user_id: Option<&str>,
        device_id: Option<&str>,
    ) -> Vec<SessionSnapshot> {
        let sessions: Vec<Arc<RwLock<Session>>> = {
            let table = self.table.read().await;
            table.sessions.values().cloned().collect()
        };

        let mut snapshots = Vec::new();
        for session in sessions {
            let guard = session.read().await;
            if !guard.is_active {
                continue;
            }
            if let Some(user) = user_id
                && guard.user_id.as_deref() != Some(user)
            {
                continue;
            }
            if let Some(device) = device_id
                && guard.device_id != device
            {
                continue;
            }
            snapshots.push(guard.snapshot());
        }
        snapshots
    }

    /// Aggregate counts over the pool.
    pub async fn statistics(&self) -> SessionStatistics {
        let table = self.table.read().await;
        SessionStatistics {
            total_sessions: table.sessions.len(),
            users_count: table.by_user.len(),
            devices_count: table.by_device.len(),
            sessions_by_user: table
                .by_user
                .iter()
                .map(|(user, ids)| (user.clone(), ids.len()))
                .collect(),
            sessions_by_device: table
                .by_device
                .iter()
                .map(|(device, ids)| (device.clone(), ids.len()))
                .collect(),
        }
    }

    async fn user_at_quota(&self, user_id: Option<&str>) -> bool {
        let Some(user) = user_id else {
            return false;
        };
        let table = self.table.read().await;
        table.by_user.get(user).map(HashSet::len).unwrap_or(0)
            >= self.settings.max_sessions_per_user
    }

    /// Finds an active session and refreshes its activity timestamp.
    async fn touch(&self, session_id: &str) -> Option<Arc<RwLock<Session>>> {
        let session = {
            let table = self.table.read().await;
            table.sessions.get(session_id)?.clone()
        };
        {
            let mut guard = session.write().await;
            if !guard.is_active {
                return None;
            }
            guard.last_activity = Utc::now();
        }
        Some(session)
    }

    /// Closes every session whose last activity predates the timeout
    /// window. Runs from the sweep task; in-flight work keeps its session
    /// lock and is never interrupted.
    async fn sweep_expired(
        table: &Arc<RwLock<SessionTable>>,
        session_timeout: Duration,
    ) -> Result<usize, NetError> {
        let window = chrono::Duration::from_std(session_timeout)
            .map_err(|e| NetError::Internal(format!("invalid session timeout: {e}")))?;
        let cutoff = Utc::now() - window;

        let candidates: Vec<(String, Arc<RwLock<Session>>)> = {
            let guard = table.read().await;
            guard
                .sessions
                .iter()
                .map(|(id, session)| (id.clone(), session.clone()))
                .collect()
        };

        let mut expired = Vec::new();
        for (session_id, session) in candidates {
            let guard = session.read().await;
            if guard.last_activity < cutoff {
                expired.push(session_id);
            }
        }

        let swept = expired.len();
        for session_id in expired {
            info!("closing expired session {session_id}");
            Self::remove_session(table, &session_id).await;
        }
        Ok(swept)
    }

    /// Index removal shared by the sweep path.
    async fn remove_session(table: &Arc<RwLock<SessionTable>>, session_id: &str) {
        let removed = {
            let mut guard = table.write().await;
            let Some(session) = guard.sessions.remove(session_id) else {
                return;
            };
            let (user_id, device_id) = {
                let session_guard = session.read().await;
                (session_guard.user_id.clone(), session_guard.device_id.clone())
            };
            if let Some(user) = user_id
                && let Some(ids) = guard.by_user.get_mut(&user)
            {
                ids.remove(session_id);
                if ids.is_empty() {
                    guard.by_user.remove(&user);
                }
            }
            if let Some(ids) = guard.by_device.get_mut(&device_id) {
                ids.remove(session_id);
                if ids.is_empty() {
                    guard.by_device.remove(&device_id);
                }
            }
            session
        };

        let mut session_guard = removed.write().await;
        session_guard.is_active = false;
        session_guard.connection.disconnect().await;
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Vendor;
    use crate::inventory::test_record;

    fn profile(id: &str) -> DeviceProfile {
        DeviceProfile::from_record(&test_record(id, Vendor::H3c), None)
    }

    fn manager(max_per_user: usize, timeout: Duration) -> SessionManager {
        SessionManager::new(SessionSettings {
            max_sessions_per_user: max_per_user,
            session_timeout: timeout,
            sweep_interval: Duration::from_secs(60),
        })
    }

    async fn admit_stub(manager: &SessionManager, device: &str, user: Option<&str>) -> Option<String> {
        let profile = profile(device);
        let connection = Connection::stub(device, &profile.name);
        manager.admit(&profile, user, connection).await
    }

    #[tokio::test]
    async fn quota_rejects_session_past_the_cap() {
        let manager = manager(2, Duration::from_secs(1800));

        assert!(admit_stub(&manager, "sw1", Some("alice")).await.is_some());
        assert!(admit_stub(&manager, "sw2", Some("alice")).await.is_some());
        assert!(admit_stub(&manager, "sw3", Some("alice")).await.is_none());

        let stats = manager.statistics().await;
        assert_eq!(stats.sessions_by_user.get("alice"), Some(&2));
    }

    #[tokio::test]
    async fn quota_is_per_user() {
        let manager = manager(1, Duration::from_secs(1800));
        assert!(admit_stub(&manager, "sw1", Some("alice")).await.is_some());
        assert!(admit_stub(&manager, "sw1", Some("bob")).await.is_some());
        assert!(admit_stub(&manager, "sw2", Some("alice")).await.is_none());
    }

    #[tokio::test]
    async fn get_refreshes_activity_and_session_survives_sweep() {
        let manager = manager(5, Duration::from_secs(60));
        let session_id = admit_stub(&manager, "sw1", Some("alice"))
            .await
            .expect("session");

        let before = manager
            .session_info(&session_id)
            .await
            .expect("info")
            .last_activity;
        manager.get(&session_id).await.expect("get refreshes");
        let after = manager
            .session_info(&session_id)
            .await
            .expect("info")
            .last_activity;
        assert!(after >= before);

        let swept = SessionManager::sweep_expired(&manager.table, Duration::from_secs(60))
            .await
            .expect("sweep");
        assert_eq!(swept, 0);
        assert!(manager.get(&session_id).await.is_some());
    }

    #[tokio::test]
    async fn sweep_closes_expired_sessions_and_clears_indices() {
        let manager = manager(5, Duration::from_secs(60));
        let stale = admit_stub(&manager, "sw1", Some("alice"))
            .await
            .expect("stale session");
        let fresh = admit_stub(&manager, "sw2", Some("bob"))
            .await
            .expect("fresh session");

        {
            let table = manager.table.read().await;
            let session = table.sessions.get(&stale).expect("stale entry").clone();
            drop(table);
            session.write().await.last_activity = Utc::now() - chrono::Duration::hours(2);
        }

        let swept = SessionManager::sweep_expired(&manager.table, Duration::from_secs(60))
            .await
            .expect("sweep");
        assert_eq!(swept, 1);
        assert!(manager.get(&stale).await.is_none());
        assert!(manager.get(&fresh).await.is_some());

        let stats = manager.statistics().await;
        assert_eq!(stats.total_sessions, 1);
        assert!(!stats.sessions_by_user.contains_key("alice"));
    }

    #[tokio::test]
    async fn close_is_idempotent_on_unknown_ids() {
        let manager = manager(5, Duration::from_secs(1800));
        assert!(!manager.close("no-such-session").await);

        let session_id = admit_stub(&manager, "sw1", None).await.expect("session");
        assert!(manager.close(&session_id).await);
        assert!(!manager.close(&session_id).await);
    }

    #[tokio::test]
    async fn commands_on_unknown_sessions_fail_structurally() {
        let manager = manager(5, Duration::from_secs(1800));
        let outcome = manager.execute_command("ghost", "display clock").await;
        assert!(!outcome.success);
        assert!(outcome.error.expect("error").contains("ghost"));

        let mut rx = manager
            .execute_interactive_command("ghost", "display clock")
            .await;
        let chunk = rx.recv().await.expect("error chunk");
        assert!(!chunk.success);
    }

    #[tokio::test]
    async fn list_sessions_filters_by_user_and_device() {
        let manager = manager(5, Duration::from_secs(1800));
        admit_stub(&manager, "sw1", Some("alice")).await.expect("a");
        admit_stub(&manager, "sw2", Some("alice")).await.expect("b");
        admit_stub(&manager, "sw2", Some("bob")).await.expect("c");

        assert_eq!(manager.list_sessions(None, None).await.len(), 3);
        assert_eq!(manager.list_sessions(Some("alice"), None).await.len(), 2);
        assert_eq!(manager.list_sessions(None, Some("sw2")).await.len(), 2);
        assert_eq!(
            manager.list_sessions(Some("bob"), Some("sw2")).await.len(),
            1
        );
    }

    #[tokio::test]
    async fn stop_force_closes_all_sessions() {
        let manager = manager(5, Duration::from_secs(1800));
        manager.start().await;
        admit_stub(&manager, "sw1", Some("alice")).await.expect("a");
        admit_stub(&manager, "sw2", Some("bob")).await.expect("b");

        manager.stop().await;
        let stats = manager.statistics().await;
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.users_count, 0);
        assert_eq!(stats.devices_count, 0);
    }

    #[tokio::test]
    async fn start_twice_keeps_one_sweeper() {
        let manager = manager(5, Duration::from_secs(1800));
        manager.start().await;
        manager.start().await;
        manager.stop().await;
    }
}
