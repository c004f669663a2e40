//! A small read-ahead block cache for the manual's PDF reader.
//!
//! The extractor makes many small, loosely sequential reads while walking
//! the PDF's object graph. The cache keeps 16 blocks of 64 KiB each in an
//! LRU-ordered singly-linked list. Reads at least one block long bypass
//! the cache entirely. The cache is not safe for concurrent use and must
//! stay confined to the extractor's thread.

use std::cell::RefCell;
use std::fs::File;
use std::io;

pub const BLOCK_SIZE: usize = 64 * 1024;
pub const BLOCK_COUNT: usize = 16;

/// Positioned reads, in the shape of `pread`.
pub trait ReadAt {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

impl ReadAt for File {
    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}

impl ReadAt for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let offset = offset.min(self.len() as u64) as usize;
        let n = buf.len().min(self.len() - offset);
        buf[..n].copy_from_slice(&self[offset..offset + n]);
        Ok(n)
    }
}

impl<'a, R: ReadAt + ?Sized> ReadAt for &'a R {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

struct Block {
    /// File offset of the block's first byte, always block-aligned.
    offset: u64,
    /// Valid bytes in `data`; shorter than a block only at end of file.
    len: usize,
    data: Box<[u8]>,
    /// Next block in least-recently-used order.
    next: Option<usize>,
}

struct Lru {
    blocks: Vec<Block>,
    /// Most recently used block, the list head.
    head: Option<usize>,
}

impl Lru {
    /// Finds the block containing `offset` and moves it to the front.
    fn take(&mut self, offset: u64) -> Option<usize> {
        let mut prev: Option<usize> = None;
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            if self.blocks[idx].offset == offset && self.blocks[idx].len > 0 {
                if let Some(p) = prev {
                    self.blocks[p].next = self.blocks[idx].next;
                    self.blocks[idx].next = self.head;
                    self.head = Some(idx);
                }
                return Some(idx);
            }
            prev = cursor;
            cursor = self.blocks[idx].next;
        }
        None
    }

    /// Returns a block to fill: a fresh one while capacity remains, the
    /// least recently used one afterwards. The block is relinked at the
    /// front.
    fn evict(&mut self) -> usize {
        if self.blocks.len() < BLOCK_COUNT {
            let idx = self.blocks.len();
            self.blocks.push(Block {
                offset: 0,
                len: 0,
                data: vec![0u8; BLOCK_SIZE].into_boxed_slice(),
                next: self.head,
            });
            self.head = Some(idx);
            return idx;
        }

        // Walk to the tail, unlink it, and relink it at the head.
        let mut prev: Option<usize> = None;
        let mut cursor = self.head.expect("cache has blocks but no head");
        while let Some(next) = self.blocks[cursor].next {
            prev = Some(cursor);
            cursor = next;
        }
        if let Some(p) = prev {
            self.blocks[p].next = None;
            self.blocks[cursor].next = self.head;
            self.head = Some(cursor);
        }
        cursor
    }
}

/// The cache itself. Wraps any [`ReadAt`] source.
pub struct BlockCache<R> {
    inner: R,
    lru: RefCell<Lru>,
}

impl<R: ReadAt> BlockCache<R> {
    pub fn new(inner: R) -> BlockCache<R> {
        BlockCache {
            inner,
            lru: RefCell::new(Lru {
                blocks: Vec::new(),
                head: None,
            }),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: ReadAt> ReadAt for BlockCache<R> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        // Large reads would only churn the cache; go straight through.
        if buf.len() >= BLOCK_SIZE {
            return self.inner.read_at(buf, offset);
        }

        let mut lru = self.lru.borrow_mut();
        let mut done = 0usize;
        while done < buf.len() {
            let pos = offset + done as u64;
            let block_offset = pos - pos % BLOCK_SIZE as u64;

            let idx = match lru.take(block_offset) {
                Some(idx) => idx,
                None => {
                    let idx = lru.evict();
                    let block = &mut lru.blocks[idx];
                    block.offset = block_offset;
                    block.len = read_full(&self.inner, &mut block.data, block_offset)?;
                    idx
                }
            };

            let block = &lru.blocks[idx];
            let start = (pos - block.offset) as usize;
            if start >= block.len {
                break; // end of file
            }
            let n = (buf.len() - done).min(block.len - start);
            buf[done..done + n].copy_from_slice(&block.data[start..start + n]);
            done += n;
            if block.len < BLOCK_SIZE {
                break; // short block: end of file
            }
        }
        Ok(done)
    }
}

/// Reads until `buf` is full or the source reports end of file.
fn read_full<R: ReadAt>(inner: &R, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut done = 0usize;
    while done < buf.len() {
        let n = inner.read_at(&mut buf[done..], offset + done as u64)?;
        if n == 0 {
            break;
        }
        done += n;
    }
    Ok(done)
}

/// A sequential `Read + Seek` view over a [`ReadAt`] source, for consumers
/// that want a stream (the PDF parser does).
pub struct Reader<R> {
    inner: R,
    len: u64,
    pos: u64,
}

impl<R: ReadAt> Reader<R> {
    pub fn new(inner: R, len: u64) -> Reader<R> {
        Reader { inner, len, pos: 0 }
    }
}

impl<R: ReadAt> io::Read for Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: ReadAt> io::Seek for Reader<R> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let target = match pos {
            io::SeekFrom::Start(n) => n as i64,
            io::SeekFrom::End(n) => self.len as i64 + n,
            io::SeekFrom::Current(n) => self.pos as i64 + n,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Counts how many times the underlying source is hit.
    struct Counting<'a> {
        data: &'a [u8],
        reads: Cell<usize>,
    }

    impl ReadAt for Counting<'_> {
        fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
            self.reads.set(self.reads.get() + 1);
            self.data.read_at(buf, offset)
        }
    }

    fn source(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn serves_repeated_reads_from_one_fetch() {
        let data = source(3 * BLOCK_SIZE);
        let counting = Counting {
            data: &data,
            reads: Cell::new(0),
        };
        let cache = BlockCache::new(&counting);

        let mut buf = [0u8; 64];
        for _ in 0..10 {
            assert_eq!(cache.read_at(&mut buf, 100).unwrap(), 64);
            assert_eq!(&buf[..], &data[100..164]);
        }
        assert_eq!(counting.reads.get(), 1);
    }

    #[test]
    fn reads_spanning_blocks() {
        let data = source(3 * BLOCK_SIZE);
        let cache = BlockCache::new(data.as_slice());

        let mut buf = [0u8; 128];
        let offset = BLOCK_SIZE as u64 - 64;
        assert_eq!(cache.read_at(&mut buf, offset).unwrap(), 128);
        assert_eq!(&buf[..], &data[BLOCK_SIZE - 64..BLOCK_SIZE + 64]);
    }

    #[test]
    fn large_reads_bypass_the_cache() {
        let data = source(3 * BLOCK_SIZE);
        let counting = Counting {
            data: &data,
            reads: Cell::new(0),
        };
        let cache = BlockCache::new(&counting);

        let mut big = vec![0u8; BLOCK_SIZE];
        cache.read_at(&mut big, 10).unwrap();
        cache.read_at(&mut big, 10).unwrap();
        // Two passthrough reads, nothing cached.
        assert_eq!(counting.reads.get(), 2);
    }

    #[test]
    fn evicts_the_least_recently_used_block() {
        let data = source((BLOCK_COUNT + 2) * BLOCK_SIZE);
        let counting = Counting {
            data: &data,
            reads: Cell::new(0),
        };
        let cache = BlockCache::new(&counting);

        let mut buf = [0u8; 16];
        // Fill every block slot, then two more to force eviction.
        for i in 0..BLOCK_COUNT + 2 {
            cache.read_at(&mut buf, (i * BLOCK_SIZE) as u64).unwrap();
        }
        let fills = counting.reads.get();

        // Block 0 was evicted and needs a refetch; the most recent did not.
        cache
            .read_at(&mut buf, ((BLOCK_COUNT + 1) * BLOCK_SIZE) as u64)
            .unwrap();
        assert_eq!(counting.reads.get(), fills);
        cache.read_at(&mut buf, 0).unwrap();
        assert!(counting.reads.get() > fills);
    }

    #[test]
    fn short_reads_at_end_of_file() {
        let data = source(100);
        let cache = BlockCache::new(data.as_slice());
        let mut buf = [0u8; 64];
        assert_eq!(cache.read_at(&mut buf, 90).unwrap(), 10);
        assert_eq!(&buf[..10], &data[90..]);
    }

    #[test]
    fn reader_seeks() {
        use std::io::{Read, Seek, SeekFrom};
        let data = source(1000);
        let cache = BlockCache::new(data.as_slice());
        let mut reader = Reader::new(cache, 1000);

        let mut buf = [0u8; 10];
        reader.seek(SeekFrom::End(-10)).unwrap();
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[990..]);

        reader.seek(SeekFrom::Start(5)).unwrap();
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf[..], &data[5..15]);
    }
}
