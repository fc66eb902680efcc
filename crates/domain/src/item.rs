//! 块处理的读-处理-写组件契约与内置实现

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use batch_core::TaskResult;
use tokio::sync::Mutex;

/// 处理器的输出：保留转换后的条目，或显式丢弃
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed<T> {
    Keep(T),
    Drop,
}

impl<T> Processed<T> {
    pub fn is_drop(&self) -> bool {
        matches!(self, Processed::Drop)
    }
}

impl<T> From<Option<T>> for Processed<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(item) => Processed::Keep(item),
            None => Processed::Drop,
        }
    }
}

/// 逐条读取，返回 `None` 表示数据结束
#[async_trait]
pub trait ItemReader<T: Send + 'static>: Send {
    async fn read(&mut self) -> TaskResult<Option<T>>;
}

#[async_trait]
pub trait ItemProcessor<I: Send + 'static, O: Send + 'static>: Send + Sync {
    async fn process(&self, item: I) -> TaskResult<Processed<O>>;
}

/// 一次调用即一次提交
#[async_trait]
pub trait ItemWriter<T: Send + Sync + 'static>: Send + Sync {
    async fn write(&self, items: &[T]) -> TaskResult<()>;
}

/// 从内存列表读取
pub struct ListItemReader<T> {
    items: std::vec::IntoIter<T>,
}

impl<T> ListItemReader<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> ItemReader<T> for ListItemReader<T> {
    async fn read(&mut self) -> TaskResult<Option<T>> {
        Ok(self.items.next())
    }
}

/// 包装任意迭代器
pub struct IteratorItemReader<It> {
    iter: It,
}

impl<It> IteratorItemReader<It> {
    pub fn new(iter: It) -> Self {
        Self { iter }
    }
}

#[async_trait]
impl<It> ItemReader<It::Item> for IteratorItemReader<It>
where
    It: Iterator + Send,
    It::Item: Send + 'static,
{
    async fn read(&mut self) -> TaskResult<Option<It::Item>> {
        Ok(self.iter.next())
    }
}

/// 以同步函数实现的处理器
pub struct FnItemProcessor<F, I, O> {
    func: F,
    _marker: PhantomData<fn(I) -> O>,
}

impl<F, I, O> FnItemProcessor<F, I, O>
where
    F: Fn(I) -> TaskResult<Processed<O>> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, I, O> ItemProcessor<I, O> for FnItemProcessor<F, I, O>
where
    F: Fn(I) -> TaskResult<Processed<O>> + Send + Sync,
    I: Send + 'static,
    O: Send + 'static,
{
    async fn process(&self, item: I) -> TaskResult<Processed<O>> {
        (self.func)(item)
    }
}

/// 原样透传
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughProcessor;

#[async_trait]
impl<T: Send + 'static> ItemProcessor<T, T> for PassThroughProcessor {
    async fn process(&self, item: T) -> TaskResult<Processed<T>> {
        Ok(Processed::Keep(item))
    }
}

/// 收集写入条目的共享容器，克隆后共享同一份数据
#[derive(Debug)]
pub struct ListItemWriter<T> {
    items: Arc<Mutex<Vec<T>>>,
    commits: Arc<Mutex<Vec<usize>>>,
}

impl<T> Clone for ListItemWriter<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            commits: self.commits.clone(),
        }
    }
}

impl<T> Default for ListItemWriter<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
            commits: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> ListItemWriter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按写入顺序返回所有条目
    pub async fn items(&self) -> Vec<T> {
        self.items.lock().await.clone()
    }

    /// 每次提交的条目数
    pub async fn commit_sizes(&self) -> Vec<usize> {
        self.commits.lock().await.clone()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> ItemWriter<T> for ListItemWriter<T> {
    async fn write(&self, items: &[T]) -> TaskResult<()> {
        self.items.lock().await.extend_from_slice(items);
        self.commits.lock().await.push(items.len());
        Ok(())
    }
}

/// 以同步函数实现的写入器
pub struct FnItemWriter<F, T> {
    func: F,
    _marker: PhantomData<fn(&T)>,
}

impl<F, T> FnItemWriter<F, T>
where
    F: Fn(&[T]) -> TaskResult<()> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T> ItemWriter<T> for FnItemWriter<F, T>
where
    F: Fn(&[T]) -> TaskResult<()> + Send + Sync,
    T: Send + Sync + 'static,
{
    async fn write(&self, items: &[T]) -> TaskResult<()> {
        (self.func)(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batch_core::TaskError;

    #[tokio::test]
    async fn test_list_reader_drains_in_order() {
        let mut reader = ListItemReader::new(vec![1, 2, 3]);
        assert_eq!(reader.read().await.unwrap(), Some(1));
        assert_eq!(reader.read().await.unwrap(), Some(2));
        assert_eq!(reader.read().await.unwrap(), Some(3));
        assert_eq!(reader.read().await.unwrap(), None);
        assert_eq!(reader.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_iterator_reader() {
        let mut reader = IteratorItemReader::new((1..=2).map(|n| n * 10));
        assert_eq!(reader.read().await.unwrap(), Some(10));
        assert_eq!(reader.read().await.unwrap(), Some(20));
        assert_eq!(reader.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fn_processor_keep_drop_error() {
        let processor = FnItemProcessor::new(|n: i32| {
            if n < 0 {
                Err(TaskError::validation("负数"))
            } else {
                Ok(Processed::from((n % 2 == 0).then_some(n)))
            }
        });

        assert_eq!(processor.process(4).await.unwrap(), Processed::Keep(4));
        assert!(processor.process(3).await.unwrap().is_drop());
        assert!(processor.process(-1).await.is_err());
    }

    #[tokio::test]
    async fn test_list_writer_shares_items_between_clones() {
        let writer: ListItemWriter<&str> = ListItemWriter::new();
        let handle = writer.clone();
        writer.write(&["a", "b"]).await.unwrap();
        writer.write(&["c"]).await.unwrap();

        assert_eq!(handle.items().await, vec!["a", "b", "c"]);
        assert_eq!(handle.commit_sizes().await, vec![2, 1]);
    }
}
