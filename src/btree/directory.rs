//! The B-tree directory page (spec §4.5, component C6): holds `(key,
//! child_block_num)` separator entries, one per child subtree, with
//! `flag[0]` naming this directory's level (0 = children are leaves).
//! Implements search-with-crabbing and insert-with-split, including the
//! `make_new_root` redirection that keeps the root's `BlockId` fixed at
//! `(dir_file, 0)` across root splits (spec §4.5/§4.6).
//!
//! Grounded on the teacher's `btree::table::BTreeTable::get_parent_with_empty_slots`
//! and its recursive parent-split-on-insert pattern, adapted to this
//! crate's own slotted-buffer layout and to the spec's fixed-root-block
//! convention, which the teacher's `BTreeRootPointerPage` indirection
//! inspired but does not implement identically.

use crate::{
    block_id::BlockId,
    btree::{
        consts::DIR_PAYLOAD_SIZE,
        page::{PageKind, SlottedBuf},
        pinned_page::PinnedPage,
    },
    database::Database,
    error::SmallError,
    types::SmallResult,
    value::{Constant, Type},
};

pub const ROOT_BLOCK_NUMBER: u32 = 0;

pub struct BTreeDirectory<'a> {
    page: PinnedPage<'a>,
    buf: SlottedBuf,
    key_type: Type,
}

pub struct DirSplit {
    pub new_block: BlockId,
    pub split_key: Constant,
}

impl<'a> BTreeDirectory<'a> {
    pub fn open(
        db: &'a Database,
        tx_id: u32,
        block: BlockId,
        key_type: Type,
        exclusive: bool,
    ) -> Result<Self, SmallError> {
        let page = PinnedPage::open(db, tx_id, block, exclusive)?;
        let bytes = page.read();
        let buf = SlottedBuf::new(bytes, key_type, DIR_PAYLOAD_SIZE, PageKind::Directory);
        Ok(Self { page, buf, key_type })
    }

    pub fn create(db: &'a Database, tx_id: u32, file_name: &str, key_type: Type, level: i64) -> Result<Self, SmallError> {
        let page = PinnedPage::open_new(db, tx_id, file_name)?;
        let mut buf = SlottedBuf::empty(key_type, DIR_PAYLOAD_SIZE, PageKind::Directory);
        buf.set_flag0(level);
        let dir = Self { page, buf, key_type };
        dir.flush();
        Ok(dir)
    }

    /// Ensure block 0 of `dir_file` exists and is initialized as an
    /// empty, level-0 root directory whose one entry points at
    /// `first_leaf`. Called once, when an index is first created.
    pub fn init_root(
        db: &'a Database,
        tx_id: u32,
        dir_file: &str,
        key_type: Type,
        first_leaf: &BlockId,
    ) -> Result<(), SmallError> {
        let mut root = Self::create(db, tx_id, dir_file, key_type, 0)?;
        assert_eq!(root.block().block_number(), ROOT_BLOCK_NUMBER, "root must be the file's first block");
        root.buf
            .insert(&Constant::min_value(key_type), &(first_leaf.block_number() as i64).to_be_bytes());
        root.flush();
        root.close()
    }

    fn flush(&self) {
        self.page.write(self.buf.bytes());
    }

    pub fn block(&self) -> &BlockId {
        self.page.block()
    }

    pub fn level(&self) -> i64 {
        self.buf.flag0()
    }

    pub fn num_records(&self) -> usize {
        self.buf.num_records()
    }

    pub fn is_full(&self) -> bool {
        self.buf.is_full()
    }

    pub fn is_root(&self) -> bool {
        self.block().block_number() == ROOT_BLOCK_NUMBER
    }

    fn child_block_num(&self, slot: usize) -> u32 {
        i64::from_be_bytes(self.buf.payload_at(slot).try_into().unwrap()) as u32
    }

    pub fn key_at(&self, slot: usize) -> Constant {
        self.buf.key_at(slot)
    }

    /// The child at `slot`, as a block in `child_file`.
    pub fn child_at(&self, slot: usize, child_file: &str) -> BlockId {
        BlockId::new(child_file, self.child_block_num(slot))
    }

    /// The child holding `key`, as a block in `child_file` (the leaf
    /// file if `level() == 0`, else this directory's own file).
    pub fn find_child(&self, key: &Constant, child_file: &str) -> BlockId {
        let mut pos = self.buf.search(key);
        if pos == self.buf.num_records() || self.buf.key_at(pos) != *key {
            pos = pos.saturating_sub(1);
        }
        BlockId::new(child_file, self.child_block_num(pos))
    }

    pub fn first_child(&self, child_file: &str) -> BlockId {
        BlockId::new(child_file, self.child_block_num(0))
    }

    /// Insert a new separator `(key, child)`, splitting this directory
    /// if it is full. The returned split's `new_block` is this
    /// directory's file's new right-hand sibling at the same level.
    pub fn insert(&mut self, key: &Constant, child: &BlockId) -> Result<Option<DirSplit>, SmallError> {
        let payload = (child.block_number() as i64).to_be_bytes().to_vec();
        if !self.buf.is_full() {
            self.buf.insert(key, &payload);
            self.flush();
            return Ok(None);
        }

        let mut new_dir = BTreeDirectory::create(
            self.page.db(),
            self.page.tx_id(),
            self.block().file_name(),
            self.key_type,
            self.level(),
        )?;
        let mid = self.buf.num_records() / 2;
        self.buf.split_into(mid, &mut new_dir.buf);

        let split_key = new_dir.buf.key_at(0);
        if key < &split_key {
            self.buf.insert(key, &payload);
        } else {
            new_dir.buf.insert(key, &payload);
        }
        self.flush();
        new_dir.flush();

        let new_block = new_dir.block().clone();
        new_dir.close()?;
        Ok(Some(DirSplit { new_block, split_key }))
    }

    /// Called when the root directory itself split: relocate the
    /// current root's contents to a fresh block, then overwrite block 0
    /// with a brand-new, one-level-higher root pointing at the
    /// relocated old root and at `right_sibling`. Keeps the root's
    /// `BlockId` permanently at `(dir_file, 0)` (spec §4.6 "the root
    /// never moves").
    pub fn make_new_root(&mut self, right_sibling: &BlockId, split_key: &Constant) -> Result<(), SmallError> {
        assert!(self.is_root());
        let db = self.page.db();
        let tx_id = self.page.tx_id();
        let dir_file = self.block().file_name().to_string();

        let mut relocated = BTreeDirectory::create(db, tx_id, &dir_file, self.key_type, self.level())?;
        relocated.buf = SlottedBuf::new(self.buf.bytes().to_vec(), self.key_type, DIR_PAYLOAD_SIZE, PageKind::Directory);
        relocated.flush();
        let relocated_block = relocated.block().clone();
        relocated.close()?;

        let new_level = self.level() + 1;
        let mut new_root_buf = SlottedBuf::empty(self.key_type, DIR_PAYLOAD_SIZE, PageKind::Directory);
        new_root_buf.set_flag0(new_level);
        new_root_buf.insert(
            &Constant::min_value(self.key_type),
            &(relocated_block.block_number() as i64).to_be_bytes(),
        );
        new_root_buf.insert(split_key, &(right_sibling.block_number() as i64).to_be_bytes());

        self.buf = new_root_buf;
        self.flush();
        Ok(())
    }

    pub fn close(self) -> SmallResult {
        let mut page = self.page;
        page.release()
    }
}
