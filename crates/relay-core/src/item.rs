use crate::id::ItemTypeId;
use serde::{Deserialize, Serialize};

/// A stack of fungible items of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_type: ItemTypeId,
    pub quantity: u32,
}

impl ItemStack {
    pub fn new(item_type: ItemTypeId, quantity: u32) -> Self {
        Self {
            item_type,
            quantity,
        }
    }
}

/// Per-resource item counts bounded by a shared capacity.
///
/// Stacks are kept in arrival order: the first stack holds the resource type
/// that has been queued the longest, which is what [`ItemBuffer::take`] and
/// [`ItemBuffer::drain_up_to`] hand out first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemBuffer {
    stacks: Vec<ItemStack>,
    capacity: u32,
}

impl ItemBuffer {
    pub fn new(capacity: u32) -> Self {
        Self {
            stacks: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Add fungible items. Returns the amount that didn't fit.
    #[must_use = "overflow count indicates items that did not fit"]
    pub fn add(&mut self, item_type: ItemTypeId, quantity: u32) -> u32 {
        let to_add = quantity.min(self.free());
        let overflow = quantity - to_add;

        if to_add > 0 {
            if let Some(stack) = self.stacks.iter_mut().find(|s| s.item_type == item_type) {
                stack.quantity += to_add;
            } else {
                self.stacks.push(ItemStack::new(item_type, to_add));
            }
        }

        overflow
    }

    /// Remove fungible items. Returns the amount actually removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn remove(&mut self, item_type: ItemTypeId, quantity: u32) -> u32 {
        let Some(stack) = self.stacks.iter_mut().find(|s| s.item_type == item_type) else {
            return 0;
        };
        let to_remove = quantity.min(stack.quantity);
        stack.quantity -= to_remove;
        if stack.quantity == 0 {
            self.stacks.retain(|s| s.quantity > 0);
        }
        to_remove
    }

    /// Overwrite the count of one item type, ignoring capacity.
    ///
    /// Used when restoring saved inventories and when staging scenarios. A
    /// buffer may end up holding more than `capacity`; [`Self::free`] then
    /// reports zero.
    pub fn set(&mut self, item_type: ItemTypeId, quantity: u32) {
        if quantity == 0 {
            self.stacks.retain(|s| s.item_type != item_type);
            return;
        }
        match self.stacks.iter_mut().find(|s| s.item_type == item_type) {
            Some(stack) => stack.quantity = quantity,
            None => self.stacks.push(ItemStack::new(item_type, quantity)),
        }
    }

    /// Take one unit of the oldest queued resource.
    pub fn take(&mut self) -> Option<ItemTypeId> {
        let stack = self.stacks.first_mut()?;
        let item_type = stack.item_type;
        stack.quantity -= 1;
        if stack.quantity == 0 {
            self.stacks.remove(0);
        }
        Some(item_type)
    }

    /// Put a unit returned by a refused [`Self::take`] back at the front.
    pub fn untake(&mut self, item_type: ItemTypeId) {
        match self.stacks.iter().position(|s| s.item_type == item_type) {
            Some(idx) => {
                self.stacks[idx].quantity += 1;
                let stack = self.stacks.remove(idx);
                self.stacks.insert(0, stack);
            }
            None => self.stacks.insert(0, ItemStack::new(item_type, 1)),
        }
    }

    /// Remove up to `max` units, oldest resource types first.
    pub fn drain_up_to(&mut self, max: u32) -> Vec<ItemStack> {
        let mut drained = Vec::new();
        let mut remaining = max;
        for stack in &mut self.stacks {
            if remaining == 0 {
                break;
            }
            let moved = stack.quantity.min(remaining);
            stack.quantity -= moved;
            remaining -= moved;
            drained.push(ItemStack::new(stack.item_type, moved));
        }
        self.stacks.retain(|s| s.quantity > 0);
        drained
    }

    /// Get quantity of a specific item type.
    pub fn quantity(&self, item_type: ItemTypeId) -> u32 {
        self.stacks
            .iter()
            .find(|s| s.item_type == item_type)
            .map(|s| s.quantity)
            .unwrap_or(0)
    }

    /// Total items across all types.
    pub fn total(&self) -> u32 {
        self.stacks.iter().map(|s| s.quantity).sum()
    }

    /// Free room left before the buffer reaches capacity.
    pub fn free(&self) -> u32 {
        self.capacity.saturating_sub(self.total())
    }

    /// Check if the buffer has room for at least one more item.
    pub fn has_space(&self) -> bool {
        self.total() < self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn clear(&mut self) {
        self.stacks.clear();
    }

    /// Stacks in arrival order.
    pub fn stacks(&self) -> &[ItemStack] {
        &self.stacks
    }
}
