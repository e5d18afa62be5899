//! Object table: attributes, tree links and properties

use crate::error::Fault;
use crate::header::Header;
use crate::memory::{Address, Memory};

/// View over the story's object table.
///
/// Objects are numbered from one. Records follow the default-property words
/// at the table base; their layout and the property header encoding differ
/// between v1-3 and v4+ stories.
#[derive(Debug, Clone, Copy)]
pub struct ObjectTable {
    version: u8,
    base: Address,
}

#[derive(Debug, Clone, Copy)]
struct PropSlot {
    /// Address of the first data byte.
    data: Address,
    number: u8,
    len: u8,
}

impl ObjectTable {
    /// Build the view from the story header.
    pub fn new(header: &Header) -> Self {
        Self {
            version: header.version,
            base: Address::from(header.obj),
        }
    }

    const fn small(&self) -> bool {
        self.version <= 3
    }

    const fn record_size(&self) -> Address {
        if self.small() {
            9
        } else {
            14
        }
    }

    const fn default_count(&self) -> Address {
        if self.small() {
            31
        } else {
            63
        }
    }

    /// Number of attribute flags per object.
    pub const fn attr_count(&self) -> u16 {
        if self.small() {
            32
        } else {
            48
        }
    }

    fn record_addr(&self, obj: u16) -> Result<Address, Fault> {
        if obj == 0 {
            return Err(Fault::BadAddress);
        }
        Ok(self.base + self.default_count() * 2 + Address::from(obj - 1) * self.record_size())
    }

    fn link_addr(&self, obj: u16, link: u8) -> Result<Address, Fault> {
        let record = self.record_addr(obj)?;
        if self.small() {
            Ok(record + 4 + Address::from(link))
        } else {
            Ok(record + 6 + Address::from(link) * 2)
        }
    }

    fn read_link(&self, memory: &Memory, obj: u16, link: u8) -> Result<u16, Fault> {
        let addr = self.link_addr(obj, link)?;
        if self.small() {
            Ok(u16::from(memory.read8(addr)?))
        } else {
            memory.read16(addr)
        }
    }

    fn write_link(&self, memory: &mut Memory, obj: u16, link: u8, value: u16) -> Result<(), Fault> {
        let addr = self.link_addr(obj, link)?;
        if self.small() {
            memory.write8(addr, value as u8)
        } else {
            memory.write16(addr, value)
        }
    }

    /// Parent object number, zero for none.
    pub fn parent(&self, memory: &Memory, obj: u16) -> Result<u16, Fault> {
        self.read_link(memory, obj, 0)
    }

    /// Sibling object number, zero for none.
    pub fn sibling(&self, memory: &Memory, obj: u16) -> Result<u16, Fault> {
        self.read_link(memory, obj, 1)
    }

    /// First child object number, zero for none.
    pub fn child(&self, memory: &Memory, obj: u16) -> Result<u16, Fault> {
        self.read_link(memory, obj, 2)
    }

    /// Set the parent link.
    pub fn set_parent(&self, memory: &mut Memory, obj: u16, parent: u16) -> Result<(), Fault> {
        self.write_link(memory, obj, 0, parent)
    }

    /// Set the sibling link.
    pub fn set_sibling(&self, memory: &mut Memory, obj: u16, sibling: u16) -> Result<(), Fault> {
        self.write_link(memory, obj, 1, sibling)
    }

    /// Set the child link.
    pub fn set_child(&self, memory: &mut Memory, obj: u16, child: u16) -> Result<(), Fault> {
        self.write_link(memory, obj, 2, child)
    }

    /// Test an attribute flag.
    pub fn attr(&self, memory: &Memory, obj: u16, attr: u16) -> Result<bool, Fault> {
        if attr >= self.attr_count() {
            return Err(Fault::BadAddress);
        }
        let byte = memory.read8(self.record_addr(obj)? + Address::from(attr / 8))?;
        Ok(byte & (0x80 >> (attr % 8)) != 0)
    }

    /// Set or clear an attribute flag.
    pub fn set_attr(&self, memory: &mut Memory, obj: u16, attr: u16, value: bool) -> Result<(), Fault> {
        if attr >= self.attr_count() {
            return Err(Fault::BadAddress);
        }
        let addr = self.record_addr(obj)? + Address::from(attr / 8);
        let mask = 0x80 >> (attr % 8);
        let byte = memory.read8(addr)?;
        let byte = if value { byte | mask } else { byte & !mask };
        memory.write8(addr, byte)
    }

    /// Address of the object's property table.
    pub fn prop_table(&self, memory: &Memory, obj: u16) -> Result<Address, Fault> {
        let offset = if self.small() { 7 } else { 12 };
        Ok(Address::from(memory.read16(self.record_addr(obj)? + offset)?))
    }

    /// Address of the object's short-name Z-string.
    pub fn name(&self, memory: &Memory, obj: u16) -> Result<Address, Fault> {
        Ok(self.prop_table(memory, obj)? + 1)
    }

    fn first_prop(&self, memory: &Memory, obj: u16) -> Result<Address, Fault> {
        let table = self.prop_table(memory, obj)?;
        let name_words = Address::from(memory.read8(table)?);
        Ok(table + 1 + name_words * 2)
    }

    /// Decode the property slot whose header starts at `addr`; `None` at the
    /// zero terminator.
    fn decode_slot(&self, memory: &Memory, addr: Address) -> Result<Option<PropSlot>, Fault> {
        let first = memory.read8(addr)?;
        if first == 0 {
            return Ok(None);
        }
        let slot = if self.small() {
            PropSlot {
                data: addr + 1,
                number: first & 0x1F,
                len: (first >> 5) + 1,
            }
        } else if first & 0x80 != 0 {
            let second = memory.read8(addr + 1)?;
            let len = second & 0x3F;
            PropSlot {
                data: addr + 2,
                number: first & 0x3F,
                len: if len == 0 { 64 } else { len },
            }
        } else {
            PropSlot {
                data: addr + 1,
                number: first & 0x3F,
                len: if first & 0x40 != 0 { 2 } else { 1 },
            }
        };
        Ok(Some(slot))
    }

    fn find_prop(&self, memory: &Memory, obj: u16, prop: u16) -> Result<Option<PropSlot>, Fault> {
        let mut addr = self.first_prop(memory, obj)?;
        while let Some(slot) = self.decode_slot(memory, addr)? {
            // Properties are stored in descending number order.
            if u16::from(slot.number) == prop {
                return Ok(Some(slot));
            }
            if u16::from(slot.number) < prop {
                return Ok(None);
            }
            addr = slot.data + Address::from(slot.len);
        }
        Ok(None)
    }

    fn default_prop(&self, memory: &Memory, prop: u16) -> Result<u16, Fault> {
        if prop == 0 || Address::from(prop) > self.default_count() {
            return Err(Fault::BadAddress);
        }
        memory.read16(self.base + Address::from(prop - 1) * 2)
    }

    /// Property value, or the table default when the object lacks it.
    pub fn prop(&self, memory: &Memory, obj: u16, prop: u16) -> Result<u16, Fault> {
        match self.find_prop(memory, obj, prop)? {
            Some(slot) if slot.len == 1 => Ok(u16::from(memory.read8(slot.data)?)),
            Some(slot) => memory.read16(slot.data),
            None => self.default_prop(memory, prop),
        }
    }

    /// Address of the property data, or zero when absent.
    pub fn prop_addr(&self, memory: &Memory, obj: u16, prop: u16) -> Result<u16, Fault> {
        Ok(match self.find_prop(memory, obj, prop)? {
            Some(slot) => slot.data as u16,
            None => 0,
        })
    }

    /// Number of the property after `prop`, or the first when `prop` is
    /// zero; zero at the end of the list.
    pub fn prop_next(&self, memory: &Memory, obj: u16, prop: u16) -> Result<u16, Fault> {
        if prop == 0 {
            let addr = self.first_prop(memory, obj)?;
            return Ok(self.decode_slot(memory, addr)?.map_or(0, |s| u16::from(s.number)));
        }
        let slot = self.find_prop(memory, obj, prop)?.ok_or(Fault::BadAddress)?;
        let next = self.decode_slot(memory, slot.data + Address::from(slot.len))?;
        Ok(next.map_or(0, |s| u16::from(s.number)))
    }

    /// Data length of the property whose data starts at `addr`; zero for a
    /// zero address.
    pub fn prop_len(&self, memory: &Memory, addr: u16) -> Result<u16, Fault> {
        if addr == 0 {
            return Ok(0);
        }
        let header = memory.read8(Address::from(addr) - 1)?;
        Ok(if self.small() {
            u16::from(header >> 5) + 1
        } else if header & 0x80 != 0 {
            match header & 0x3F {
                0 => 64,
                len => u16::from(len),
            }
        } else if header & 0x40 != 0 {
            2
        } else {
            1
        })
    }

    /// Overwrite a property value; the property must exist with a one or
    /// two byte length.
    pub fn set_prop(&self, memory: &mut Memory, obj: u16, prop: u16, value: u16) -> Result<(), Fault> {
        let slot = self.find_prop(memory, obj, prop)?.ok_or(Fault::BadAddress)?;
        match slot.len {
            1 => memory.write8(slot.data, value as u8),
            2 => memory.write16(slot.data, value),
            _ => Err(Fault::BadAddress),
        }
    }

    /// Unlink an object from its parent's child chain.
    pub fn remove(&self, memory: &mut Memory, obj: u16) -> Result<(), Fault> {
        let parent = self.parent(memory, obj)?;
        if parent == 0 {
            return Ok(());
        }
        let sibling = self.sibling(memory, obj)?;
        let mut link = self.child(memory, parent)?;
        if link == obj {
            self.set_child(memory, parent, sibling)?;
        } else {
            while link != 0 {
                let next = self.sibling(memory, link)?;
                if next == obj {
                    self.set_sibling(memory, link, sibling)?;
                    break;
                }
                link = next;
            }
        }
        self.set_parent(memory, obj, 0)?;
        self.set_sibling(memory, obj, 0)
    }

    /// Move an object to be the first child of `parent`.
    pub fn insert(&self, memory: &mut Memory, obj: u16, parent: u16) -> Result<(), Fault> {
        self.remove(memory, obj)?;
        let first = self.child(memory, parent)?;
        self.set_sibling(memory, obj, first)?;
        self.set_child(memory, parent, obj)?;
        self.set_parent(memory, obj, parent)
    }
}
