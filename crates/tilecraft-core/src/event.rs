//! Typed event bus.
//!
//! Every successful command and every tick emits events describing what
//! changed. Events are buffered while the command or tick runs and delivered
//! in emission order once it finishes, so listeners always observe a
//! consistent state. The pending queue is unbounded; only the history of
//! already delivered events is capped.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`]. Suppressed
//! events are dropped at emission and never reach a listener.

use crate::fixed::Millis;
use crate::grid::GridPosition;
use crate::id::*;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Where a spawned material came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnSource {
    Factory(FactoryId),
    /// Periodic raw-material spawning.
    Ambient,
    /// Placed directly by the host.
    Manual,
}

/// A game event. All events carry the game time at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Board --
    GridUpdated {
        time: Millis,
    },
    CellUnlocked {
        position: GridPosition,
        cost: u64,
        time: Millis,
    },
    MaterialSpawned {
        position: GridPosition,
        material: MaterialId,
        source: SpawnSource,
        time: Millis,
    },

    // -- Crafting --
    CraftingStarted {
        job: CraftJobId,
        recipe: RecipeId,
        time: Millis,
    },
    CraftingCompleted {
        job: CraftJobId,
        recipe: RecipeId,
        material: Option<MaterialId>,
        position: GridPosition,
        time: Millis,
    },
    RecipeUnlocked {
        recipe: RecipeId,
        cost: u64,
        time: Millis,
    },

    // -- Orders & score --
    OrderAdded {
        order: OrderId,
        material: MaterialId,
        time: Millis,
    },
    OrderFulfilled {
        order: OrderId,
        reward: u64,
        time: Millis,
    },
    OrderSlotUnlocked {
        slots: u32,
        cost: u64,
        time: Millis,
    },
    ScoreChanged {
        score: u64,
        time: Millis,
    },

    // -- Factories --
    FactoryPurchased {
        factory: FactoryId,
        factory_type: FactoryTypeId,
        cost: u64,
        time: Millis,
    },
    FactoryPlaced {
        factory: FactoryId,
        position: GridPosition,
        time: Millis,
    },
    FactoryMoved {
        factory: FactoryId,
        from: Option<GridPosition>,
        to: Option<GridPosition>,
        time: Millis,
    },
    FactoryCombined {
        consumed: [FactoryId; 2],
        result: FactoryId,
        factory_type: FactoryTypeId,
        time: Millis,
    },
    FactorySpedUp {
        factory: FactoryId,
        amount: Millis,
        next_produce: Millis,
        time: Millis,
    },
}

/// Discriminant tag for event types, used for subscription and suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GridUpdated,
    CellUnlocked,
    MaterialSpawned,
    CraftingStarted,
    CraftingCompleted,
    RecipeUnlocked,
    OrderAdded,
    OrderFulfilled,
    OrderSlotUnlocked,
    ScoreChanged,
    FactoryPurchased,
    FactoryPlaced,
    FactoryMoved,
    FactoryCombined,
    FactorySpedUp,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 15;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::GridUpdated { .. } => EventKind::GridUpdated,
            Event::CellUnlocked { .. } => EventKind::CellUnlocked,
            Event::MaterialSpawned { .. } => EventKind::MaterialSpawned,
            Event::CraftingStarted { .. } => EventKind::CraftingStarted,
            Event::CraftingCompleted { .. } => EventKind::CraftingCompleted,
            Event::RecipeUnlocked { .. } => EventKind::RecipeUnlocked,
            Event::OrderAdded { .. } => EventKind::OrderAdded,
            Event::OrderFulfilled { .. } => EventKind::OrderFulfilled,
            Event::OrderSlotUnlocked { .. } => EventKind::OrderSlotUnlocked,
            Event::ScoreChanged { .. } => EventKind::ScoreChanged,
            Event::FactoryPurchased { .. } => EventKind::FactoryPurchased,
            Event::FactoryPlaced { .. } => EventKind::FactoryPlaced,
            Event::FactoryMoved { .. } => EventKind::FactoryMoved,
            Event::FactoryCombined { .. } => EventKind::FactoryCombined,
            Event::FactorySpedUp { .. } => EventKind::FactorySpedUp,
        }
    }

    /// Game time at which the event occurred.
    pub fn time(&self) -> Millis {
        match self {
            Event::GridUpdated { time }
            | Event::CellUnlocked { time, .. }
            | Event::MaterialSpawned { time, .. }
            | Event::CraftingStarted { time, .. }
            | Event::CraftingCompleted { time, .. }
            | Event::RecipeUnlocked { time, .. }
            | Event::OrderAdded { time, .. }
            | Event::OrderFulfilled { time, .. }
            | Event::OrderSlotUnlocked { time, .. }
            | Event::ScoreChanged { time, .. }
            | Event::FactoryPurchased { time, .. }
            | Event::FactoryPlaced { time, .. }
            | Event::FactoryMoved { time, .. }
            | Event::FactoryCombined { time, .. }
            | Event::FactorySpedUp { time, .. } => *time,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer: delivered history
// ---------------------------------------------------------------------------

/// A fixed-capacity ring buffer. When full, the oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        let capacity = self.capacity();
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % capacity;
        if self.len < capacity {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Stored events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        let capacity = self.capacity();
        let start = if self.len < capacity { 0 } else { self.head };
        (0..self.len).filter_map(move |offset| self.events[(start + offset) % capacity].as_ref())
    }

    /// Remove and return all stored events, oldest first.
    pub fn drain(&mut self) -> Vec<Event> {
        let capacity = self.capacity();
        let start = if self.len < capacity { 0 } else { self.head };
        let mut out = Vec::with_capacity(self.len);
        for offset in 0..self.len {
            if let Some(event) = self.events[(start + offset) % capacity].take() {
                out.push(event);
            }
        }
        self.head = 0;
        self.len = 0;
        out
    }
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// A listener receives events read-only.
pub type Listener = Box<dyn FnMut(&Event)>;

/// Optional predicate that filters events for a subscriber.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

/// Priority level for event subscribers. Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

struct SubscriberEntry {
    listener: Listener,
    priority: SubscriberPriority,
    filter: Option<EventFilter>,
    insertion_order: u64,
}

impl std::fmt::Debug for SubscriberEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberEntry")
            .field("priority", &self.priority)
            .field("filtered", &self.filter.is_some())
            .field("insertion_order", &self.insertion_order)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Buffers emitted events and hands them to per-kind subscribers.
pub struct EventBus {
    pending: Vec<Event>,
    history: EventBuffer,
    suppressed: [bool; EVENT_KIND_COUNT],
    subscribers: [Vec<SubscriberEntry>; EVENT_KIND_COUNT],
    emitted: [u64; EVENT_KIND_COUNT],
    next_insertion_order: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending.len())
            .field("history", &self.history.len())
            .field("suppressed", &self.suppressed)
            .field("emitted", &self.emitted)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a bus that remembers the last `history_capacity` delivered
    /// events.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            pending: Vec::new(),
            history: EventBuffer::new(history_capacity),
            suppressed: [false; EVENT_KIND_COUNT],
            subscribers: std::array::from_fn(|_| Vec::new()),
            emitted: [0; EVENT_KIND_COUNT],
            next_insertion_order: 0,
        }
    }

    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
    }

    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = false;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Buffer an event for the next delivery. No-op if its kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        self.emitted[idx] += 1;
        self.pending.push(event);
    }

    /// Register a listener with Normal priority and no filter.
    pub fn on(&mut self, kind: EventKind, listener: Listener) {
        self.on_filtered(kind, SubscriberPriority::Normal, None, listener);
    }

    /// Register a listener with explicit priority and optional filter.
    pub fn on_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: Listener,
    ) {
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        let subscribers = &mut self.subscribers[kind.index()];
        subscribers.push(SubscriberEntry {
            listener,
            priority,
            filter,
            insertion_order: order,
        });
        subscribers.sort_by_key(|entry| (entry.priority, entry.insertion_order));
    }

    /// Deliver every pending event, oldest first, to the subscribers of its
    /// kind in `(priority, registration)` order. Returns the delivered events.
    pub fn deliver(&mut self) -> Vec<Event> {
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            for entry in &mut self.subscribers[event.kind().index()] {
                if let Some(filter) = &entry.filter
                    && !filter(event)
                {
                    continue;
                }
                (entry.listener)(event);
            }
            self.history.push(event.clone());
        }
        events
    }

    /// The most recently delivered events, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &Event> + '_ {
        self.history.iter()
    }

    /// Events delivered since the bus was created, including those that
    /// have since left the history.
    pub fn total_delivered(&self) -> u64 {
        self.history.total_written()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Total events ever emitted for a kind (suppressed ones excluded).
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.emitted[kind.index()]
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers[kind.index()].len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
