// ==========================================
// SObject 数据加载 - 进度上报
// ==========================================
// 职责: 生产者（解析器）发送进度，消费者（调用方）以 Stream 接收
// 约束: 取值范围 [0, 100]，单调不减
// ==========================================

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

/// 进度接收端（futures::Stream<Item = f64>）
pub type ProgressStream = UnboundedReceiver<f64>;

/// 进度生产端
#[derive(Debug)]
pub struct ProgressReporter {
    sender: Option<UnboundedSender<f64>>,
    last: f64,
}

/// 创建进度通道
pub fn progress_channel() -> (ProgressReporter, ProgressStream) {
    let (sender, receiver) = unbounded();
    (
        ProgressReporter {
            sender: Some(sender),
            last: 0.0,
        },
        receiver,
    )
}

impl ProgressReporter {
    /// 不上报进度
    pub fn disabled() -> Self {
        Self {
            sender: None,
            last: 0.0,
        }
    }

    /// 上报进度（超出范围截断；低于上次值时按上次值发送）
    pub fn report(&mut self, value: f64) {
        let value = if value.is_nan() { self.last } else { value.clamp(0.0, 100.0) };
        let value = value.max(self.last);
        self.last = value;
        if let Some(sender) = &self.sender {
            // 接收端已关闭时忽略
            let _ = sender.unbounded_send(value);
        }
    }

    /// 最近一次上报值
    pub fn last(&self) -> f64 {
        self.last
    }
}
