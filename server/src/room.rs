//! `GameHost` (§4.7): a single room's isolated worker — join/auth-code
//! admission, the 40 Hz tick loop, anticheat kick handling, and chat relay.
//!
//! Generalizes the teacher's `network::Server::run` (`tokio::select!` over
//! a message channel plus a `tokio::time::interval`) from one server-wide
//! loop into one room-scoped loop; the join/auth-code exchange is modeled
//! on the teacher's `Connect`/`Connected`/`Disconnected` handshake in
//! `network.rs::handle_packet`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use shared::entity::EntityId;
use shared::map::Map;
use shared::player::{refresh_properties, KickReason, PlayerProperties};
use shared::protocol::{
    modifier_wire, ClientEvent, GameInfo, PlayerPropertiesWire, PlayerTickData, ServerEvent, TickSnapshot,
};

use crate::account::{Account, AccountStore};
use crate::chat::{ChatDecision, ChatFilter, ChatLimiter};
use crate::config::{RoomConfig, RoomOptions};
use crate::error::JoinError;
use crate::transport::{OutboundSender, RoomCommand};
use crate::world::{PlayerEntity, ProjectileHit, World};

const TICK_PERIOD: Duration = Duration::from_millis(25);
const TPS_WARNING_GRACE: Duration = Duration::from_secs(2);
const TPS_WARNING_INTERVAL: Duration = Duration::from_secs(60);
const TPS_WARNING_THRESHOLD: f32 = 30.0;

struct PendingJoin {
    username: String,
    account: Account,
    expires_at: Instant,
}

/// A room's worker state. Owns its `World` exclusively — spec §5: "no
/// shared mutable state between rooms; all interaction is by messages."
pub struct GameHost {
    room_id: String,
    host_username: String,
    max_players: u32,
    public: bool,
    world: World,
    account_store: Arc<dyn AccountStore>,
    chat_limiter: ChatLimiter,
    chat_filter: Box<dyn ChatFilter>,
    commands: mpsc::Receiver<RoomCommand>,
    outbound: HashMap<String, OutboundSender>,
    pending_joins: HashMap<Uuid, PendingJoin>,
    connect_timeout: Duration,
    started: bool,
    last_tps_warning: Option<Instant>,
}

impl GameHost {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        room_id: String,
        host_username: String,
        options: RoomOptions,
        config: RoomConfig,
        map: Map,
        account_store: Arc<dyn AccountStore>,
        chat_filter: Box<dyn ChatFilter>,
        commands: mpsc::Receiver<RoomCommand>,
    ) -> Self {
        if !map.has_enough_spawns(options.max_players as usize) {
            log::error!(
                "room {}: map {} has fewer spawn points than max_players {}",
                room_id,
                map.id,
                options.max_players
            );
        }

        let mut world = World::new(config.game_physics_resolution);
        let map_id = map.id.clone();
        world.register_map(map);
        world.set_current_map(&map_id);
        world.spawn_lootboxes();

        GameHost {
            room_id,
            host_username,
            max_players: options.max_players,
            public: options.public,
            world,
            account_store,
            chat_limiter: ChatLimiter::new(&config),
            chat_filter,
            commands,
            outbound: HashMap::new(),
            pending_joins: HashMap::new(),
            connect_timeout: Duration::from_secs(config.game_connect_timeout_secs),
            started: false,
            last_tps_warning: None,
        }
    }

    pub fn game_info(&self) -> GameInfo {
        GameInfo {
            room_id: self.room_id.clone(),
            host_username: self.host_username.clone(),
            map_id: self
                .world
                .current_map()
                .map(|m| m.id.clone())
                .unwrap_or_default(),
            max_players: self.max_players,
            public: self.public,
        }
    }

    pub fn is_joinable(&self) -> bool {
        self.public && (self.world.player_count() as u32) < self.max_players
    }

    /// Drive the room until shutdown (§4.7 tick loop + shutdown conditions).
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let started_at = Instant::now();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.purge_expired_pending();
                    let report = self.world.step();
                    let hits = self.world.step_projectiles();
                    for hit in hits {
                        match hit {
                            ProjectileHit::Player { projectile, player } => log::debug!(
                                "room {}: projectile {} hit player {}",
                                self.room_id, projectile, player
                            ),
                            ProjectileHit::Projectile { projectile, other } => log::debug!(
                                "room {}: projectile {} hit projectile {}",
                                self.room_id, projectile, other
                            ),
                        }
                    }
                    self.handle_kicks(report.kicks).await;

                    let elapsed = started_at.elapsed().as_secs_f32().max(0.001);
                    let tps = self.world.tick() as f32 / elapsed;
                    self.broadcast_tick(tps);
                    self.world.decay_overrides();
                    self.maybe_warn_tps(tps, started_at.elapsed());

                    if self.started && self.world.player_count() < 2 {
                        log::info!("room {}: fewer than 2 players after start, shutting down", self.room_id);
                        break;
                    }
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => {
                            if self.handle_command(command).await {
                                break;
                            }
                        }
                        None => {
                            log::warn!("room {}: command channel closed unexpectedly", self.room_id);
                            break;
                        }
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// Returns `true` when the room should stop ticking.
    async fn handle_command(&mut self, command: RoomCommand) -> bool {
        match command {
            RoomCommand::Shutdown => {
                log::info!("room {}: shutdown requested", self.room_id);
                true
            }
            RoomCommand::Join { account, reply } => {
                let _ = reply.send(self.try_join(account));
                false
            }
            RoomCommand::Connect { username, auth_code, outbound, reply } => {
                let ok = self.try_connect(username, auth_code, outbound);
                let _ = reply.send(ok);
                false
            }
            RoomCommand::ClientEvent { username, event } => {
                self.handle_client_event(username, event).await;
                false
            }
            RoomCommand::Disconnect { username } => {
                self.remove_player(&username);
                false
            }
        }
    }

    /// §4.7 join protocol step 2, the in-room half (cross-room duplicate
    /// checking and account loading happen in the room manager before this
    /// is called).
    fn try_join(&mut self, account: Account) -> Result<Uuid, JoinError> {
        let username = account.username.clone();
        if self.world.id_for_username(&username).is_some()
            || self.pending_joins.values().any(|p| p.username == username)
        {
            return Err(JoinError::AlreadyInRoom);
        }
        if self.world.player_count() as u32 >= self.max_players {
            return Err(JoinError::RoomFull);
        }

        let code = Uuid::new_v4();
        let expires_at = Instant::now() + self.connect_timeout;
        self.pending_joins.insert(code, PendingJoin { username, account, expires_at });
        Ok(code)
    }

    /// §4.7 join protocol step 4: redeem a one-time auth code atomically.
    fn try_connect(&mut self, username: String, auth_code: Uuid, outbound: OutboundSender) -> bool {
        let Some(pending) = self.pending_joins.remove(&auth_code) else {
            log::warn!("room {}: unknown or reused auth code from {}", self.room_id, username);
            return false;
        };
        if pending.username != username || Instant::now() > pending.expires_at {
            log::warn!("room {}: auth code mismatch or expiry for {}", self.room_id, username);
            return false;
        }

        let mut rng = rand::thread_rng();
        if self.world.add_player(pending.account, &mut rng).is_none() {
            log::error!("room {}: no spawn point available for {}", self.room_id, username);
            return false;
        }

        let _ = outbound.try_send(ServerEvent::GameInfo(self.game_info()));
        let _ = outbound.try_send(ServerEvent::InitPlayerPhysics {
            username: username.clone(),
            base_properties: PlayerPropertiesWire::from(&PlayerProperties::default()),
        });
        self.outbound.insert(username, outbound);
        true
    }

    async fn handle_client_event(&mut self, username: String, event: ClientEvent) {
        match event {
            ClientEvent::Ping => self.send_to(&username, ServerEvent::Pong),
            ClientEvent::Ready => {}
            ClientEvent::ReadyStart(start) => {
                if start {
                    self.started = true;
                }
            }
            ClientEvent::Tick(input) => {
                let Some(id) = self.world.id_for_username(&username) else { return };
                if let Some(kick) = self.world.apply_player_input(id, &input) {
                    self.kick(&username, kick).await;
                }
            }
            ClientEvent::ChatMessage(text) => self.relay_chat(username, text),
        }
    }

    fn relay_chat(&mut self, username: String, text: String) {
        if self.chat_filter.is_blocked(&text) {
            return;
        }
        match self.chat_limiter.check(&username, Instant::now()) {
            ChatDecision::RateLimited => {}
            ChatDecision::Accept => self.broadcast(ServerEvent::ChatMessage(vec![username, text])),
        }
    }

    async fn handle_kicks(&mut self, kicks: Vec<(EntityId, KickReason)>) {
        for (id, reason) in kicks {
            if let Some(username) = self.world.username_for_id(id).map(str::to_string) {
                self.kick(&username, reason).await;
            }
        }
    }

    /// Anticheat kick (§4.4, §7): notify the client, record the infraction,
    /// persist the account, and remove the player.
    async fn kick(&mut self, username: &str, reason: KickReason) {
        log::warn!("room {}: kicking {} ({})", self.room_id, username, reason.as_str());
        self.send_to(username, ServerEvent::Kicked(reason));
        if let Some(mut player) = self.take_player(username) {
            player.account.record_infraction(reason.as_str());
            self.save_account(&player);
        }
    }

    /// Ordinary disconnect: no infraction, account persisted as-is.
    fn remove_player(&mut self, username: &str) {
        if let Some(player) = self.take_player(username) {
            self.save_account(&player);
        }
    }

    fn take_player(&mut self, username: &str) -> Option<PlayerEntity> {
        let id = self.world.id_for_username(username)?;
        self.outbound.remove(username);
        self.world.remove_player(id)
    }

    fn save_account(&self, player: &PlayerEntity) {
        if let Err(err) = self.account_store.save(&player.account) {
            log::error!("room {}: failed to save account for {}: {}", self.room_id, player.username, err);
        }
    }

    fn purge_expired_pending(&mut self) {
        let now = Instant::now();
        self.pending_joins.retain(|_, pending| pending.expires_at > now);
    }

    fn broadcast_tick(&mut self, tps: f32) {
        let players: Vec<PlayerTickData> = self
            .world
            .players
            .iter()
            .map(|(&id, player)| player_tick_data(id, player))
            .collect();
        let snapshot = TickSnapshot { tick: self.world.tick(), tps, players };

        let mut dead = Vec::new();
        for (username, sender) in &self.outbound {
            if sender.try_send(ServerEvent::Tick(snapshot.clone())).is_err() {
                dead.push(username.clone());
            }
        }
        for username in dead {
            self.remove_player(&username);
        }
    }

    /// §4.7: "average TPS below 30 more than 2s after start triggers a
    /// throttled (≤1/min) warning."
    fn maybe_warn_tps(&mut self, tps: f32, since_start: Duration) {
        if since_start < TPS_WARNING_GRACE || tps >= TPS_WARNING_THRESHOLD {
            return;
        }
        let now = Instant::now();
        let should_warn = self.last_tps_warning.map_or(true, |last| now.duration_since(last) >= TPS_WARNING_INTERVAL);
        if should_warn {
            log::warn!("room {}: average tps {:.1} below target", self.room_id, tps);
            self.last_tps_warning = Some(now);
        }
    }

    fn send_to(&self, username: &str, event: ServerEvent) {
        if let Some(sender) = self.outbound.get(username) {
            let _ = sender.try_send(event);
        }
    }

    fn broadcast(&self, event: ServerEvent) {
        for sender in self.outbound.values() {
            let _ = sender.try_send(event.clone());
        }
    }

    /// §4.7 shutdown path: stop ticking, remove all players (one final
    /// account save each), notify remaining sockets, exit.
    async fn shutdown(mut self) {
        log::info!("room {}: shutting down with {} player(s)", self.room_id, self.world.player_count());
        self.broadcast(ServerEvent::GameEnd);
        let ids: Vec<EntityId> = self.world.players.keys().copied().collect();
        for id in ids {
            if let Some(player) = self.world.remove_player(id) {
                self.save_account(&player);
            }
        }
    }
}

fn player_tick_data(id: EntityId, player: &PlayerEntity) -> PlayerTickData {
    let effective = refresh_properties(&player.base_properties, &player.modifiers);
    let modifiers = player.modifiers.iter().map(|(&id, state)| modifier_wire(id, state)).collect();
    PlayerTickData {
        id,
        x: player.body.position.x,
        y: player.body.position.y,
        angle: player.body.angle,
        vx: player.body.vx,
        vy: player.body.vy,
        va: player.body.angular_velocity,
        username: player.username.clone(),
        color: player.color.to_string(),
        properties: PlayerPropertiesWire::from(&effective),
        modifiers,
        override_position: player.anticheat.override_next_tick > 0,
    }
}
