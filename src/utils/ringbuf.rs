/// 定长历史缓冲区，写满后覆盖最旧的元素
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: Vec<T>,
    // 下一个写入位置
    write: usize,
    len: usize,
}

impl<T: Clone + Default> RingBuffer<T> {
    pub fn new(size: usize) -> Self {
        RingBuffer {
            buf: vec![T::default(); size.max(1)],
            write: 0,
            len: 0,
        }
    }

    pub fn push_overwrite(&mut self, item: T) {
        self.buf[self.write] = item;
        self.write = (self.write + 1) % self.buf.len();
        self.len = (self.len + 1).min(self.buf.len());
    }

    /// 从最旧到最新遍历
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let start = (self.write + self.buf.len() - self.len) % self.buf.len();
        (0..self.len).map(move |i| &self.buf[(start + i) % self.buf.len()])
    }

    pub fn clear(&mut self) {
        self.write = 0;
        self.len = 0;
    }
}
