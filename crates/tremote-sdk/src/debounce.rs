//! 防抖器
//!
//! 过滤输入框每敲一个键都会触发一次重新过滤；这里用"取消并重排"的
//! 延迟任务把它收敛成输入静止后的一次执行：每次 `schedule` 都中止
//! 挂起的任务并重新计时，静止满配置的延迟后才把最后的值投递到
//! 消费侧的通道里。

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// 取消并重排的延迟投递器
pub struct Debouncer<T: Send + 'static> {
    delay: Duration,
    tx: mpsc::UnboundedSender<T>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// 返回防抖器与接收端；接收端应归消费视图的单一逻辑线程所有
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                delay,
                tx,
                pending: Mutex::new(None),
            },
            rx,
        )
    }

    /// 取消挂起的投递并用新值重新计时
    pub fn schedule(&self, value: T) {
        let mut pending = self.pending.lock();
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        let tx = self.tx.clone();
        let delay = self.delay;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(value);
        }));
    }

    /// 丢弃挂起的投递
    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rapid_schedules_collapse_to_last_value() {
        let (debouncer, mut rx) = Debouncer::new(Duration::from_millis(80));

        // 模拟连续按键
        debouncer.schedule("u".to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;
        debouncer.schedule("ub".to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;
        debouncer.schedule("ubu".to_string());

        let value = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("等待防抖投递超时")
            .expect("通道被关闭");
        assert_eq!(value, "ubu");

        // 前两次已被取消，不会再有投递
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancel_drops_pending_delivery() {
        let (debouncer, mut rx) = Debouncer::new(Duration::from_millis(50));
        debouncer.schedule(1);
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_quiesced_schedules_each_deliver() {
        let (debouncer, mut rx) = Debouncer::new(Duration::from_millis(30));

        debouncer.schedule(1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.schedule(2);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(rx.try_recv().unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap(), 2);
    }
}
