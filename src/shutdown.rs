use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// 优雅关闭管理器
pub struct ShutdownManager {
    /// 关闭信号发送器
    shutdown_tx: Arc<RwLock<Option<broadcast::Sender<()>>>>,
    /// 是否已经关闭
    is_shutdown: Arc<RwLock<bool>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            shutdown_tx: Arc::new(RwLock::new(Some(shutdown_tx))),
            is_shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// 订阅关闭信号
    pub async fn subscribe(&self) -> broadcast::Receiver<()> {
        let shutdown_tx = self.shutdown_tx.read().await;
        if let Some(ref tx) = *shutdown_tx {
            tx.subscribe()
        } else {
            // 如果已经关闭，创建一个立即触发的接收器
            let (tx, rx) = broadcast::channel(1);
            let _ = tx.send(());
            rx
        }
    }

    /// 触发关闭
    pub async fn shutdown(&self) {
        let mut is_shutdown = self.is_shutdown.write().await;
        if *is_shutdown {
            debug!("关闭管理器已经触发过关闭");
            return;
        }

        info!("触发系统关闭");
        *is_shutdown = true;

        let shutdown_tx = self.shutdown_tx.read().await;
        if let Some(ref tx) = *shutdown_tx {
            let subscriber_count = tx.receiver_count();
            debug!("发送关闭信号给 {} 个订阅者", subscriber_count);

            // 发送关闭信号，忽略错误（可能没有接收者）
            let _ = tx.send(());
        }

        drop(shutdown_tx);
        let mut shutdown_tx = self.shutdown_tx.write().await;
        *shutdown_tx = None;

        info!("关闭信号已发送");
    }

    pub async fn is_shutdown(&self) -> bool {
        *self.is_shutdown.read().await
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ShutdownManager {
    fn clone(&self) -> Self {
        Self {
            shutdown_tx: Arc::clone(&self.shutdown_tx),
            is_shutdown: Arc::clone(&self.is_shutdown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_shutdown_manager_basic() {
        let manager = ShutdownManager::new();
        assert!(!manager.is_shutdown().await);

        let mut rx = manager.subscribe().await;
        manager.shutdown().await;

        let result = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_ok());
        assert!(manager.is_shutdown().await);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let manager = ShutdownManager::new();

        let mut rx1 = manager.subscribe().await;
        let mut rx2 = manager.subscribe().await;

        manager.shutdown().await;

        assert!(timeout(Duration::from_millis(100), rx1.recv()).await.is_ok());
        assert!(timeout(Duration::from_millis(100), rx2.recv()).await.is_ok());
    }

    #[tokio::test]
    async fn test_subscribe_after_shutdown() {
        let manager = ShutdownManager::new();
        manager.shutdown().await;

        // 关闭后订阅应该立即收到信号
        let mut rx = manager.subscribe().await;
        let result = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_double_shutdown() {
        let manager = ShutdownManager::new();

        manager.shutdown().await;
        assert!(manager.is_shutdown().await);

        // 第二次关闭应该是无操作
        manager.shutdown().await;
        assert!(manager.is_shutdown().await);
    }
}
