//! Slot-bitmap heap page layout.
//!
//! A heap page stores `num_slots` fixed-width tuples behind a bitmap
//! header. `num_slots = (page_size * 8) / (tuple_size * 8 + 1)`: each slot
//! costs one tuple plus one header bit. The header occupies
//! `ceil(num_slots / 8)` bytes; bit *i* (most-significant first within each
//! byte) is set iff slot *i* is occupied. A zeroed buffer is a valid empty
//! page.

use crate::access::tuple::{RecordId, Tuple, TupleDesc};
use crate::error::{DbError, DbResult};
use crate::storage::page::{Page, PageId};
use std::io::Cursor;
use std::sync::Arc;

/// Number of tuple slots a page of `page_size` bytes can hold.
pub fn num_slots(page_size: usize, tuple_size: usize) -> usize {
    (page_size * 8) / (tuple_size * 8 + 1)
}

/// Bytes taken by the slot bitmap.
pub fn header_len(num_slots: usize) -> usize {
    num_slots.div_ceil(8)
}

/// Typed view over a page's raw bytes.
pub struct HeapPage<'a> {
    pid: PageId,
    desc: &'a Arc<TupleDesc>,
    data: &'a mut [u8],
}

impl<'a> HeapPage<'a> {
    pub fn new(page: &'a mut Page, desc: &'a Arc<TupleDesc>) -> Self {
        let pid = page.pid();
        Self {
            pid,
            desc,
            data: page.data_mut(),
        }
    }

    pub fn pid(&self) -> PageId {
        self.pid
    }

    pub fn num_slots(&self) -> usize {
        num_slots(self.data.len(), self.desc.tuple_size())
    }

    fn header_len(&self) -> usize {
        header_len(self.num_slots())
    }

    fn tuple_offset(&self, slot: u16) -> usize {
        self.header_len() + slot as usize * self.desc.tuple_size()
    }

    pub fn slot_occupied(&self, slot: u16) -> bool {
        let i = slot as usize;
        self.data[i / 8] & (0x80 >> (i % 8)) != 0
    }

    fn set_slot(&mut self, slot: u16, occupied: bool) {
        let i = slot as usize;
        if occupied {
            self.data[i / 8] |= 0x80 >> (i % 8);
        } else {
            self.data[i / 8] &= !(0x80 >> (i % 8));
        }
    }

    pub fn empty_slot_count(&self) -> usize {
        (0..self.num_slots() as u16)
            .filter(|&slot| !self.slot_occupied(slot))
            .count()
    }

    /// Writes the tuple into the first empty slot and stamps its record id.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> DbResult<u16> {
        if tuple.desc().tuple_size() != self.desc.tuple_size() {
            return Err(DbError::SchemaMismatch(format!(
                "tuple width {} does not match page width {}",
                tuple.desc().tuple_size(),
                self.desc.tuple_size()
            )));
        }
        let slot = (0..self.num_slots() as u16)
            .find(|&slot| !self.slot_occupied(slot))
            .ok_or(DbError::PageFull(self.pid))?;

        let offset = self.tuple_offset(slot);
        let mut buf = Vec::with_capacity(self.desc.tuple_size());
        tuple.write_to(&mut buf)?;
        self.data[offset..offset + buf.len()].copy_from_slice(&buf);
        self.set_slot(slot, true);
        tuple.set_record_id(Some(RecordId::new(self.pid, slot)));
        Ok(slot)
    }

    /// Clears the slot named by the record id. The tuple bytes stay in
    /// place; the bitmap alone decides liveness.
    pub fn delete_tuple(&mut self, rid: RecordId) -> DbResult<()> {
        if rid.pid != self.pid || rid.slot as usize >= self.num_slots() {
            return Err(DbError::InvalidPage {
                table_id: rid.pid.table_id,
                page_no: rid.pid.page_no,
            });
        }
        if !self.slot_occupied(rid.slot) {
            return Err(DbError::SlotEmpty {
                pid: self.pid,
                slot: rid.slot,
            });
        }
        self.set_slot(rid.slot, false);
        Ok(())
    }

    /// Decodes the tuple at an occupied slot.
    pub fn read_tuple(&self, slot: u16) -> DbResult<Tuple> {
        if slot as usize >= self.num_slots() {
            return Err(DbError::SlotEmpty {
                pid: self.pid,
                slot,
            });
        }
        if !self.slot_occupied(slot) {
            return Err(DbError::SlotEmpty {
                pid: self.pid,
                slot,
            });
        }
        let offset = self.tuple_offset(slot);
        let mut cursor = Cursor::new(&self.data[offset..offset + self.desc.tuple_size()]);
        let mut tuple = Tuple::read_from(self.desc.clone(), &mut cursor)?;
        tuple.set_record_id(Some(RecordId::new(self.pid, slot)));
        Ok(tuple)
    }

    /// All live tuples on the page, in slot order.
    pub fn tuples(&self) -> DbResult<Vec<Tuple>> {
        let mut out = Vec::new();
        for slot in 0..self.num_slots() as u16 {
            if self.slot_occupied(slot) {
                out.push(self.read_tuple(slot)?);
            }
        }
        Ok(out)
    }
}
