use interface::OrderSide;

use crate::config::{
    BASE_PRICE_STEP_RATIO, ORDER_SIDE_ALTERNATE_PROBABILITY, PRICE_ADJUSTMENT_PROBABILITY,
    PRICE_RANDOMIZATION_FACTOR, WalkDirection,
};
use crate::rng::Sampler;

/// 가격 워크 상태 머신.
/// 현재가를 기준으로 다음 목표가를 생성하고, 주문 방향을 결정한다.
/// phase는 sideways 모드의 진동 위상으로, 호출마다 단조 증가한다.
pub struct PriceWalk {
    direction: WalkDirection,
    max_deviation: f64,
    phase: f64,
    last_side: Option<OrderSide>,
}

impl PriceWalk {
    pub fn new(direction: WalkDirection, max_deviation: f64) -> Self {
        Self {
            direction,
            max_deviation,
            phase: 0.0,
            last_side: None,
        }
    }

    pub fn direction(&self) -> WalkDirection {
        self.direction
    }

    pub fn last_side(&self) -> Option<OrderSide> {
        self.last_side
    }

    /// 다음 목표가 계산.
    /// 결과는 항상 [현재가*(1-편차), 현재가*(1+편차)] 구간으로 클램프된다.
    /// 계산이 비정상 값(NaN/inf)으로 흘러가면 현재가를 그대로 돌려준다 —
    /// 한 사이클의 목표가 계산 실패가 루프를 멈추게 하지 않는다.
    pub fn next_target(&mut self, sampler: &mut dyn Sampler, current_price: f64) -> f64 {
        let base_step = current_price * BASE_PRICE_STEP_RATIO;
        let noise = base_step
            * sampler.uniform(-PRICE_RANDOMIZATION_FACTOR, PRICE_RANDOMIZATION_FACTOR);

        let target = match self.direction {
            WalkDirection::Up => {
                let step = base_step * (1.0 + sampler.uniform(0.0, 1.0)) + noise;
                current_price + step
            }
            WalkDirection::Down => {
                let step = base_step * (1.0 + sampler.uniform(0.0, 1.0)) + noise;
                current_price - step
            }
            WalkDirection::Sideways => {
                // 위상을 조금씩 전진시켜서 연속 호출 간 상관이 있는 진동을 만든다
                let amplitude = base_step * 2.0;
                self.phase += sampler.uniform(0.1, 0.3);
                current_price + amplitude * self.phase.sin() + noise
            }
            WalkDirection::Random => {
                let sign = if sampler.chance(0.5) { 1.0 } else { -1.0 };
                current_price + base_step * sampler.uniform(0.5, 2.0) * sign + noise
            }
        };

        let max_price = current_price * (1.0 + self.max_deviation);
        let min_price = current_price * (1.0 - self.max_deviation);
        let clamped = target.clamp(min_price, max_price);

        if clamped.is_finite() {
            clamped
        } else {
            current_price
        }
    }

    /// 주문 방향 결정.
    /// 직전 방향이 있으면 높은 확률로 반대 방향을 고른다 (동일 방향 연속 방지).
    /// 고른 방향이 목표가와 어긋나면 (목표가 위인데 sell 등) 일정 확률로
    /// 목표가 쪽으로 보정한다 — 강제 규칙이 아니라 소프트한 편향.
    pub fn next_side(
        &mut self,
        sampler: &mut dyn Sampler,
        current_price: f64,
        target_price: f64,
    ) -> OrderSide {
        let mut side = match self.last_side {
            None => {
                if sampler.chance(0.5) {
                    OrderSide::Buy
                } else {
                    OrderSide::Sell
                }
            }
            Some(last) => {
                if sampler.chance(ORDER_SIDE_ALTERNATE_PROBABILITY) {
                    last.opposite()
                } else {
                    last
                }
            }
        };

        if target_price > current_price && side == OrderSide::Sell {
            if sampler.chance(PRICE_ADJUSTMENT_PROBABILITY) {
                side = OrderSide::Buy;
            }
        } else if target_price < current_price && side == OrderSide::Buy {
            if sampler.chance(PRICE_ADJUSTMENT_PROBABILITY) {
                side = OrderSide::Sell;
            }
        }

        self.last_side = Some(side);
        side
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{SeqSampler, ThreadSampler};

    #[test]
    fn test_target_stays_within_deviation_all_directions() {
        let directions = [
            WalkDirection::Up,
            WalkDirection::Down,
            WalkDirection::Sideways,
            WalkDirection::Random,
        ];

        for direction in directions {
            let mut walk = PriceWalk::new(direction, 0.01);
            let mut sampler = ThreadSampler;

            for _ in 0..500 {
                let target = walk.next_target(&mut sampler, 100.0);
                assert!(
                    (99.0..=101.0).contains(&target),
                    "direction {:?}: target {} out of bounds",
                    direction,
                    target
                );
            }
        }
    }

    #[test]
    fn test_up_direction_never_below_current() {
        // up 모드에서 노이즈가 최대로 음수여도 스텝이 더 커서
        // 목표가는 항상 현재가 이상이다
        let mut walk = PriceWalk::new(WalkDirection::Up, 0.01);
        let mut sampler = ThreadSampler;

        for _ in 0..500 {
            let target = walk.next_target(&mut sampler, 100.0);
            assert!((100.0..=101.0).contains(&target), "target {}", target);
        }
    }

    #[test]
    fn test_down_direction_never_above_current() {
        let mut walk = PriceWalk::new(WalkDirection::Down, 0.01);
        let mut sampler = ThreadSampler;

        for _ in 0..500 {
            let target = walk.next_target(&mut sampler, 100.0);
            assert!((99.0..=100.0).contains(&target), "target {}", target);
        }
    }

    #[test]
    fn test_sideways_phase_increases() {
        let mut walk = PriceWalk::new(WalkDirection::Sideways, 0.01);
        let mut sampler = ThreadSampler;

        let mut prev_phase = walk.phase;
        for _ in 0..10 {
            walk.next_target(&mut sampler, 100.0);
            assert!(walk.phase > prev_phase);
            prev_phase = walk.phase;
        }
    }

    #[test]
    fn test_wide_deviation_still_clamped() {
        let mut walk = PriceWalk::new(WalkDirection::Random, 0.1);
        let mut sampler = ThreadSampler;

        for _ in 0..500 {
            let target = walk.next_target(&mut sampler, 0.002);
            assert!((0.0018..=0.0022).contains(&target));
        }
    }

    #[test]
    fn test_first_side_uses_coin_flip() {
        // 첫 호출: chance(0.5) 하나만 소비. 0.1 < 0.5 → Buy.
        // 목표가가 현재가보다 높고 side=Buy이므로 보정 draw는 없다.
        let mut walk = PriceWalk::new(WalkDirection::Up, 0.01);
        let mut sampler = SeqSampler::new(&[0.1]);

        let side = walk.next_side(&mut sampler, 100.0, 100.5);
        assert_eq!(side, OrderSide::Buy);
        assert_eq!(walk.last_side(), Some(OrderSide::Buy));
    }

    #[test]
    fn test_side_alternation_bias() {
        let mut walk = PriceWalk::new(WalkDirection::Up, 0.01);

        // 첫 호출: coin flip 0.9 → Sell. 목표가 위 + Sell → 보정 draw 0.9 >= 0.7 → 유지.
        let mut sampler = SeqSampler::new(&[0.9, 0.9]);
        assert_eq!(walk.next_side(&mut sampler, 100.0, 100.5), OrderSide::Sell);

        // 두 번째: alternate draw 0.1 < 0.8 → Buy로 전환. Buy는 목표가와 일치, 보정 없음.
        let mut sampler = SeqSampler::new(&[0.1]);
        assert_eq!(walk.next_side(&mut sampler, 100.0, 100.5), OrderSide::Buy);
    }

    #[test]
    fn test_side_repeats_when_alternation_fails() {
        let mut walk = PriceWalk::new(WalkDirection::Down, 0.01);

        // 첫 호출: coin 0.1 → Buy. 목표가 아래 + Buy → 보정 draw 0.9 → 유지 (Buy).
        let mut sampler = SeqSampler::new(&[0.1, 0.9]);
        assert_eq!(walk.next_side(&mut sampler, 100.0, 99.5), OrderSide::Buy);

        // 다음: alternate draw 0.9 >= 0.8 → Buy 유지. 보정 draw 0.1 < 0.7 → Sell로 보정.
        let mut sampler = SeqSampler::new(&[0.9, 0.1]);
        assert_eq!(walk.next_side(&mut sampler, 100.0, 99.5), OrderSide::Sell);
        assert_eq!(walk.last_side(), Some(OrderSide::Sell));
    }

    #[test]
    fn test_directional_override_toward_target() {
        let mut walk = PriceWalk::new(WalkDirection::Up, 0.01);

        // coin 0.9 → Sell, 목표가 위 → 보정 draw 0.1 < 0.7 → Buy로 보정
        let mut sampler = SeqSampler::new(&[0.9, 0.1]);
        let side = walk.next_side(&mut sampler, 100.0, 100.8);
        assert_eq!(side, OrderSide::Buy);
    }
}
