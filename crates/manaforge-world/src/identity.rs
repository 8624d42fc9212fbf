//! World identities: the in-world objects a connection gets bound to.
//!
//! The session layer never looks inside an identity. It only needs the
//! handful of capabilities in [`Identity`], which the world collaborator
//! implements for whatever its character type is.

use std::collections::HashMap;
use std::fmt;

use manaforge_protocol::ItemId;

// ---------------------------------------------------------------------------
// Ids and coordinates
// ---------------------------------------------------------------------------

/// Stable key of a world identity. Used to address delivery to whoever is
/// currently playing that character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityId(pub u64);

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapId(pub u16);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map-{}", self.0)
    }
}

/// Tile coordinates on a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: u16,
    pub y: u16,
}

impl Position {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Identity trait
// ---------------------------------------------------------------------------

/// Capabilities the game server needs from a world identity.
///
/// Handlers delegate every gameplay effect to these methods; business rules
/// (weight limits, class restrictions, pathing) live behind them.
pub trait Identity: Send + 'static {
    fn id(&self) -> IdentityId;

    /// Display name, shown to others in chat.
    fn name(&self) -> &str;

    fn map_id(&self) -> MapId;

    fn position(&self) -> Position;

    /// Requests movement towards `dest`. Actually walking there is the
    /// world's business.
    fn set_destination(&mut self, dest: Position);

    fn add_item(&mut self, item: ItemId);

    fn has_item(&self, item: ItemId) -> bool;

    /// Equips `item` into `slot`. Returns whether it worked.
    fn equip(&mut self, item: ItemId, slot: u8) -> bool;
}

// ---------------------------------------------------------------------------
// Character — a plain in-memory identity
// ---------------------------------------------------------------------------

/// Number of equipment slots a [`Character`] has.
pub const EQUIPMENT_SLOTS: u8 = 10;

/// A self-contained [`Identity`] with no world behind it.
///
/// Walking is instant (the destination becomes the position), the inventory
/// is an unbounded multiset, and equipping only requires holding the item.
/// Good enough for tests, bots, and the demo server.
#[derive(Debug, Clone)]
pub struct Character {
    id: IdentityId,
    name: String,
    map: MapId,
    position: Position,
    inventory: HashMap<ItemId, u32>,
    equipment: HashMap<u8, ItemId>,
}

impl Character {
    pub fn new(id: u64, name: impl Into<String>, map: MapId, position: Position) -> Self {
        Self {
            id: IdentityId(id),
            name: name.into(),
            map,
            position,
            inventory: HashMap::new(),
            equipment: HashMap::new(),
        }
    }

    /// How many of `item` the character holds.
    pub fn item_count(&self, item: ItemId) -> u32 {
        self.inventory.get(&item).copied().unwrap_or(0)
    }

    pub fn equipped(&self, slot: u8) -> Option<ItemId> {
        self.equipment.get(&slot).copied()
    }
}

impl Identity for Character {
    fn id(&self) -> IdentityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn map_id(&self) -> MapId {
        self.map
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_destination(&mut self, dest: Position) {
        self.position = dest;
    }

    fn add_item(&mut self, item: ItemId) {
        *self.inventory.entry(item).or_insert(0) += 1;
    }

    fn has_item(&self, item: ItemId) -> bool {
        self.item_count(item) > 0
    }

    fn equip(&mut self, item: ItemId, slot: u8) -> bool {
        if slot >= EQUIPMENT_SLOTS || !self.has_item(item) {
            return false;
        }
        self.equipment.insert(slot, item);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hero() -> Character {
        Character::new(1, "hero", MapId(1), Position::new(10, 10))
    }

    #[test]
    fn test_identity_id_display() {
        assert_eq!(IdentityId(42).to_string(), "I-42");
    }

    #[test]
    fn test_add_item_then_has_item() {
        let mut c = hero();
        assert!(!c.has_item(ItemId(7)));
        c.add_item(ItemId(7));
        c.add_item(ItemId(7));
        assert!(c.has_item(ItemId(7)));
        assert_eq!(c.item_count(ItemId(7)), 2);
    }

    #[test]
    fn test_equip_requires_item_and_valid_slot() {
        let mut c = hero();
        assert!(!c.equip(ItemId(3), 0));

        c.add_item(ItemId(3));
        assert!(!c.equip(ItemId(3), EQUIPMENT_SLOTS));
        assert!(c.equip(ItemId(3), 2));
        assert_eq!(c.equipped(2), Some(ItemId(3)));
    }

    #[test]
    fn test_set_destination_moves_immediately() {
        let mut c = hero();
        c.set_destination(Position::new(3, 4));
        assert_eq!(c.position(), Position::new(3, 4));
    }
}
